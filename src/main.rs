use std::path::PathBuf;

use staffroll::app::RunOptions;

enum Cli {
    Exit,
    Run(RunOptions),
}

fn main() {
    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Cli::Exit) => return,
        Ok(Cli::Run(options)) => options,
        Err(message) => {
            eprintln!("error: {message}\n\nRun with --help for usage.");
            std::process::exit(2);
        }
    };

    if let Err(err) = staffroll::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Cli, String> {
    let mut options = RunOptions::default();
    let mut saw_flag = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Staffroll {}", staffroll::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "Staffroll - Browse employee posts and comments from the terminal.\n\n  --version, -V          Show version and exit\n  --help,    -h          Show this help message\n  --config PATH          Read configuration from PATH\n  --api-base URL         Override the REST API base URL\n  --print USER_ID        Print one employee's posts as HTML and exit"
                );
                saw_flag = true;
            }
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                options.config_file = Some(PathBuf::from(path));
            }
            "--api-base" => {
                let base = args.next().ok_or("--api-base needs a URL")?;
                options.api_base = Some(base);
            }
            "--print" => {
                let user = args.next().ok_or("--print needs an employee id")?;
                options.print_user = Some(user);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    if saw_flag {
        Ok(Cli::Exit)
    } else {
        Ok(Cli::Run(options))
    }
}
