use erdedit::editor::{Editor, EditorConfig};
use erdedit::integrity;
use erdedit::model::Diagram;
use erdedit::script;
use std::env;
use std::fs;
use std::process;
use tracing::Level;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <diagram.json> [options]", args[0]);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  -s, --script <file>   Apply a JSON editing script");
        eprintln!("  -o, --output <file>   Output file (default: stdout)");
        eprintln!("      --history <n>     Undo/redo stack capacity (default: 200)");
        eprintln!("      --audit           Check invariants after every edit and at the end");
        eprintln!("  -v, --verbose         Log every edit to stderr");
        process::exit(1);
    }

    let input_path = &args[1];
    let mut script_path: Option<String> = None;
    let mut output_path: Option<String> = None;
    let mut config = EditorConfig::default();
    let mut audit = false;
    let mut verbose = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "-s" | "--script" => {
                i += 1;
                if i < args.len() {
                    script_path = Some(args[i].clone());
                }
            }
            "-o" | "--output" => {
                i += 1;
                if i < args.len() {
                    output_path = Some(args[i].clone());
                }
            }
            "--history" => {
                i += 1;
                if i < args.len() {
                    config.history_capacity = args[i].parse().unwrap_or_else(|_| {
                        eprintln!("Invalid history capacity: {}", args[i]);
                        process::exit(1);
                    });
                }
            }
            "--audit" => audit = true,
            "-v" | "--verbose" => verbose = true,
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if verbose { Level::DEBUG } else { Level::WARN })
        .init();

    config.audit_mutations = audit;

    let input = match fs::read_to_string(input_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let diagram: Diagram = match serde_json::from_str(&input) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Invalid diagram: {}", e);
            process::exit(1);
        }
    };

    let mut editor = Editor::with_config(config);
    editor.load(diagram);

    if let Some(path) = script_path {
        let source = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to read {}: {}", path, e);
                process::exit(1);
            }
        };
        let applied = script::parse(&source).and_then(|steps| script::run(&mut editor, steps));
        if let Err(e) = applied {
            eprintln!("Script error: {}", e);
            process::exit(1);
        }
    }

    if audit {
        let violations = integrity::audit(editor.diagram());
        for violation in &violations {
            eprintln!("{}", violation);
        }
        if !violations.is_empty() {
            eprintln!("{} invariant violation(s)", violations.len());
        }
    }

    let json = match serde_json::to_string_pretty(editor.diagram()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to serialize diagram: {}", e);
            process::exit(1);
        }
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, &json) {
                eprintln!("Failed to write {}: {}", path, e);
                process::exit(1);
            }
        }
        None => println!("{}", json),
    }
}
