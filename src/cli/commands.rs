use clap::{Parser, Subcommand};
use qcompat::relay::Transport;
use std::path::PathBuf;

/// `qcompat` - keeps Qiskit code working on the 1.x SDK.
#[derive(Parser, Debug)]
#[command(name = "qcompat")]
#[command(author = "theonlyhennygod")]
#[command(version = "0.1.0")]
#[command(about = "Rewrites deprecated Qiskit code and renders circuit diagrams.", long_about = None)]
pub struct Cli {
    /// Workspace root (default: $QCOMPAT_WORKSPACE, $WORKSPACE_FOLDER, or the current directory)
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fix one file in place, or a buffer read from stdin
    Fix {
        /// File to fix
        #[arg(required_unless_present = "stdin", conflicts_with = "stdin")]
        file: Option<PathBuf>,

        /// Read code from stdin and print the fixed version
        #[arg(long)]
        stdin: bool,

        /// With --stdin, also copy the fixed code to the clipboard
        #[arg(long, requires = "stdin")]
        copy: bool,

        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Fix every matching file in the workspace once
    Scan {
        /// Directory to scan instead of the workspace root
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Watch workspace files and fix them as they are saved
    Watch {
        /// Where notifications go (pipe: stdout lines, slot: notification file)
        #[arg(long, value_enum, default_value = "slot")]
        notify: Transport,
    },

    /// Watch the clipboard and fix copied Qiskit code
    Clipboard {
        /// Where notifications go (pipe: stdout lines, slot: notification file)
        #[arg(long, value_enum, default_value = "slot")]
        notify: Transport,
    },

    /// Run background watchers and show their notifications until Ctrl-C
    Serve {
        /// Do not start the file watcher
        #[arg(long)]
        no_files: bool,

        /// Also start the clipboard watcher
        #[arg(long)]
        clipboard: bool,
    },

    /// Draw the circuit a file defines to an image
    Render {
        /// Python file, or `-` for stdin
        file: PathBuf,

        /// Variable to draw when the file defines several circuits
        #[arg(long)]
        circuit: Option<String>,

        /// Output directory (default: render.output_dir)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check the interpreter, packages, and workspace state
    Doctor,

    /// Install dependencies, write config and editor tasks
    Setup {
        /// Install missing packages without asking
        #[arg(long)]
        yes: bool,

        /// Only report missing packages
        #[arg(long)]
        skip_install: bool,

        /// Do not touch .vscode/tasks.json
        #[arg(long)]
        no_tasks: bool,

        /// Also create example_circuit.py
        #[arg(long)]
        example: bool,
    },
}
