use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use quark::config::{self, Config};
use quark::editor::NoteEditor;
use quark::error::{QuarkError, Result};
use quark::highlight::{Dictionary, Highlighter};
use quark::notes::{ItemRef, NoteManager};
use quark::paint::Palette;
use quark::preview;
use quark::render::Renderer;
use quark::session::Session;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!("quark {}", VERSION);
    println!("A note taker for markdown and plain text notes");
    println!();
    println!("USAGE:");
    println!("    quark [OPTIONS]");
    println!("    quark <COMMAND> [ARGS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
    println!("    -c, --config     Print config file path");
    println!("    -d, --dir        Print notes directory path");
    println!();
    println!("COMMANDS:");
    println!("    list                       Show notes and notebooks (default)");
    println!("    show [NOTE]                Print a note, or the last opened one");
    println!("    render NOTE                Print the note as an HTML document");
    println!("    export NOTE FILE           Write the note as an HTML document");
    println!("    highlight NOTE             Print the note with markdown highlighting");
    println!("    watch NOTE [FILE]          Re-render the note whenever it changes");
    println!("    append NOTE [TEXT]         Add TEXT, or lines read from stdin, to a note");
    println!("    new NAME [NOTEBOOK]        Create an empty note");
    println!("    notebook NAME              Create a notebook");
    println!("    rename ITEM NEW_NAME       Rename a note or notebook");
    println!("    delete ITEM                Delete a note or notebook");
    println!();
    println!("Notes inside a notebook are written NOTEBOOK/NOTE.");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    if let Some(first) = args.first() {
        match first.as_str() {
            "-v" | "--version" => {
                println!("quark {}", VERSION);
                return;
            }
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-c" | "--config" => {
                println!("{}", Config::config_path().display());
                return;
            }
            "-d" | "--dir" => {
                println!("{}", Config::load().notes_path().display());
                return;
            }
            s if s.starts_with('-') => {
                eprintln!("Unknown option: {}", s);
                eprintln!("Run 'quark --help' for usage information");
                process::exit(2);
            }
            _ => {}
        }
    }

    let Some(command) = parse_command(&args) else {
        eprintln!("Unknown command: {}", args.join(" "));
        eprintln!("Run 'quark --help' for usage information");
        process::exit(2);
    };

    let config = Config::load_or_create();
    let mut session = Session::load();

    let result = run(command, &config, &mut session);

    if should_save_session(&result) {
        if let Err(e) = session.save() {
            log::warn!("Failed to save session: {e}");
        }
    }

    match result {
        Ok(()) => {}
        Err(e @ QuarkError::NotesDirDeclined(_)) => println!("{}", e.user_message()),
        Err(e) => {
            log::debug!("{e:?}");
            eprintln!("Error: {}", e.user_message());
            process::exit(1);
        }
    }
}

#[derive(Debug, PartialEq)]
enum Command<'a> {
    List,
    Show(Option<&'a str>),
    Render(&'a str),
    Export(&'a str, &'a str),
    Highlight(&'a str),
    Watch(&'a str, Option<&'a str>),
    Append(&'a str, Option<String>),
    New(&'a str, Option<&'a str>),
    Notebook(&'a str),
    Rename(&'a str, &'a str),
    Delete(&'a str),
}

fn parse_command(args: &[String]) -> Option<Command<'_>> {
    let command = args.first().map(String::as_str).unwrap_or("list");
    let arg = |i: usize| args.get(i).map(String::as_str);

    let parsed = match (command, arg(1), arg(2)) {
        ("append", Some(name), Some(_)) => Command::Append(name, Some(args[2..].join(" "))),
        ("append", Some(name), None) => Command::Append(name, None),
        (_, _, Some(_)) if args.len() > 3 => return None,
        ("list", None, None) => Command::List,
        ("show", name, None) => Command::Show(name),
        ("render", Some(name), None) => Command::Render(name),
        ("export", Some(name), Some(out)) => Command::Export(name, out),
        ("highlight", Some(name), None) => Command::Highlight(name),
        ("watch", Some(name), out) => Command::Watch(name, out),
        ("new", Some(name), notebook) => Command::New(name, notebook),
        ("notebook", Some(name), None) => Command::Notebook(name),
        ("rename", Some(name), Some(new_name)) => Command::Rename(name, new_name),
        ("delete", Some(name), None) => Command::Delete(name),
        _ => return None,
    };
    Some(parsed)
}

/// The session is left alone when there was no notes directory to work in.
fn should_save_session(result: &Result<()>) -> bool {
    !matches!(result, Err(QuarkError::NotesDirDeclined(_)))
}

fn run(command: Command<'_>, config: &Config, session: &mut Session) -> Result<()> {
    let mut manager = NoteManager::open(config.notes_path(), confirm_create)?;

    match command {
        Command::List => print_tree(&manager),
        Command::Show(name) => {
            let path = match name {
                Some(name) => resolve_note(&manager, name)?,
                None => session
                    .last_existing_note()
                    .map(Path::to_path_buf)
                    .ok_or_else(|| QuarkError::NotFound("a last opened note".to_string()))?,
            };
            let mut editor = NoteEditor::default();
            editor.open(&path)?;
            println!("{}", editor.title());
            println!();
            println!("{}", editor.text());
            session.last_note = Some(path);
        }
        Command::Render(name) => {
            let path = resolve_note(&manager, name)?;
            let editor = open_editor(&path, config)?;
            print!("{}", Renderer::from_config(config)?.render(&editor.text()));
            session.last_note = Some(path);
        }
        Command::Export(name, out) => {
            let path = resolve_note(&manager, name)?;
            let editor = open_editor(&path, config)?;
            Renderer::from_config(config)?.export(&editor.text(), Path::new(out))?;
            println!("Exported {} to {}", editor.title(), out);
            session.last_note = Some(path);
        }
        Command::Highlight(name) => {
            let path = resolve_note(&manager, name)?;
            let editor = open_editor(&path, config)?;
            let palette = Palette::from_theme(&config.highlight);
            let document = editor.document();
            let mut stdout = io::stdout().lock();
            for (i, line) in document.lines().iter().enumerate() {
                writeln!(stdout, "{}", palette.paint_line(line, document.spans(i)))
                    .map_err(|e| QuarkError::io("<stdout>", e))?;
            }
            session.last_note = Some(path);
        }
        Command::Watch(name, out) => {
            let path = resolve_note(&manager, name)?;
            let out = out.map(PathBuf::from).unwrap_or_else(|| path.with_extension("html"));
            let renderer = Renderer::from_config(config)?;
            session.last_note = Some(path.clone());
            // The loop only ends on an error or Ctrl+C, so store the session now.
            if let Err(e) = session.save() {
                log::warn!("Failed to save session: {e}");
            }
            println!("Watching {} (Ctrl+C to stop)", path.display());
            preview::watch(&path, &out, &renderer, config)?;
        }
        Command::Append(name, text) => {
            let path = resolve_note(&manager, name)?;
            let period = Duration::from_millis(config.autosave_every);
            let mut editor = open_editor(&path, config)?.with_autosave(period, Instant::now());
            match text {
                Some(text) => {
                    editor.append_line(&text);
                }
                None => {
                    for line in io::stdin().lock().lines() {
                        let line = line.map_err(|e| QuarkError::io("<stdin>", e))?;
                        editor.append_line(&line);
                        if editor.poll_autosave(Instant::now())? {
                            log::info!("Autosaved {}", path.display());
                        }
                    }
                }
            }
            editor.save()?;
            println!("Saved {}", editor.title());
            session.last_note = Some(path);
        }
        Command::New(name, notebook) => {
            let notebook = match notebook {
                Some(nb) => match manager.lookup(nb) {
                    Some(ItemRef::Notebook(id)) => Some(id),
                    _ => return Err(QuarkError::NotFound(format!("a notebook named '{nb}'"))),
                },
                None => None,
            };
            let id = manager.create_note(name, notebook)?;
            if let Some(path) = manager.path(ItemRef::Note(id)) {
                println!("Created {}", path.display());
                session.last_note = Some(path.to_path_buf());
            }
        }
        Command::Notebook(name) => {
            let id = manager.create_notebook(name)?;
            if let Some(path) = manager.path(ItemRef::Notebook(id)) {
                println!("Created {}", path.display());
            }
        }
        Command::Rename(name, new_name) => {
            let item = lookup(&manager, name)?;
            let renamed = manager.rename(item, new_name)?;
            if let Some(path) = manager.path(renamed) {
                println!("Renamed {} to {}", name, path.display());
            }
        }
        Command::Delete(name) => {
            let item = lookup(&manager, name)?;
            let path = manager.path(item).map(Path::to_path_buf);
            manager.delete(item)?;
            if session.last_note.is_some() && session.last_note == path {
                session.last_note = None;
            }
            println!("Deleted {}", name);
        }
    }
    Ok(())
}

fn confirm_create(root: &Path) -> bool {
    print!("Notes directory {} does not exist. Create it? [y/N] ", root.display());
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn lookup(manager: &NoteManager, name: &str) -> Result<ItemRef> {
    manager
        .lookup(name)
        .ok_or_else(|| QuarkError::NotFound(format!("'{name}'")))
}

/// A note name from the manager, or failing that a path to any file.
fn resolve_note(manager: &NoteManager, name: &str) -> Result<PathBuf> {
    match manager.lookup(name) {
        Some(item @ ItemRef::Note(_)) => manager
            .path(item)
            .map(Path::to_path_buf)
            .ok_or_else(|| QuarkError::NotFound(format!("'{name}'"))),
        Some(ItemRef::Notebook(_)) => Err(QuarkError::NotFound(format!("a note named '{name}', it is a notebook"))),
        None => {
            let path = config::expand_path(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(QuarkError::NotFound(format!("'{name}'")))
            }
        }
    }
}

fn open_editor(path: &Path, config: &Config) -> Result<NoteEditor> {
    let mut editor = NoteEditor::new(load_highlighter(config));
    editor.open(path)?;
    Ok(editor)
}

fn load_highlighter(config: &Config) -> Highlighter {
    let highlighter = Highlighter::default();
    let Some(path) = config.dictionary_path() else {
        return highlighter;
    };
    match Dictionary::load(&path) {
        Ok(dictionary) => highlighter.with_dictionary(dictionary),
        Err(e) => {
            log::warn!("Spell check disabled: {e}");
            highlighter
        }
    }
}

fn print_tree(manager: &NoteManager) {
    println!("{}", manager.root().display());
    if manager.row_count(None) == 0 {
        println!("  (no notes yet, create one with 'quark new NAME')");
        return;
    }
    for row in 0..manager.row_count(None) {
        let Some(item) = manager.item_at(row, None) else {
            continue;
        };
        print_item(manager, item, 1);
        if let ItemRef::Notebook(_) = item {
            for child_row in 0..manager.row_count(Some(item)) {
                if let Some(child) = manager.item_at(child_row, Some(item)) {
                    print_item(manager, child, 2);
                }
            }
        }
    }
}

fn print_item(manager: &NoteManager, item: ItemRef, depth: usize) {
    let icon = manager.icon(item).map(|i| i.symbol()).unwrap_or(" ");
    let name = manager.name(item).unwrap_or("?");
    println!("{}{} {}", "  ".repeat(depth), icon, name);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(parse_command(&[]), Some(Command::List));
        assert_eq!(parse_command(&args("show")), Some(Command::Show(None)));
        assert_eq!(parse_command(&args("watch a.md")), Some(Command::Watch("a.md", None)));
        assert_eq!(parse_command(&args("new plan.md work")), Some(Command::New("plan.md", Some("work"))));
        assert_eq!(parse_command(&args("rename a.md b.md")), Some(Command::Rename("a.md", "b.md")));
    }

    #[test]
    fn test_parse_append_joins_text() {
        assert_eq!(
            parse_command(&args("append log.md bought milk today")),
            Some(Command::Append("log.md", Some("bought milk today".to_string())))
        );
        assert_eq!(parse_command(&args("append log.md")), Some(Command::Append("log.md", None)));
        assert_eq!(parse_command(&args("append")), None);
    }

    #[test]
    fn test_parse_rejects_unknown_commands() {
        assert_eq!(parse_command(&args("frobnicate")), None);
        assert_eq!(parse_command(&args("render")), None);
        assert_eq!(parse_command(&args("delete a b")), None);
        assert_eq!(parse_command(&args("export a.md out.html extra")), None);
    }

    #[test]
    fn test_session_not_saved_when_notes_dir_declined() {
        assert!(should_save_session(&Ok(())));
        assert!(should_save_session(&Err(QuarkError::NotFound("x".to_string()))));
        assert!(!should_save_session(&Err(QuarkError::NotesDirDeclined(PathBuf::from("/notes")))));
    }
}
