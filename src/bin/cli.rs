#![cfg(not(tarpaulin_include))]

use chrono::NaiveDate;
use shopfloor::config::Config;
use shopfloor::login::{self, Registration};
use shopfloor::query;
use shopfloor::scanner::{CancelToken, ImageFiles};
use shopfloor::sequence;
use shopfloor::store::StoreId;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "Usage:
  shopfloor-cli register <name> <username> <email> <phone>
  shopfloor-cli scan <image>...
  shopfloor-cli search <coloring|qa|washing> <YYYY-MM-DD>
  shopfloor-cli next-serial <coloring|qa|washing>";

fn parse_store(name: &str) -> Result<StoreId, String> {
    StoreId::from_name(name).ok_or_else(|| format!("Unknown store: {}", name))
}

fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let store = config.record_store();

    match args {
        [cmd, name, username, email, phone] if cmd == "register" => {
            let form = Registration::new(name, username, email, phone);
            let image = login::register_user(&config, &store, &form)?;
            println!("Registration successful! QR code saved to {}", image.path.display());
        }
        [cmd, images @ ..] if cmd == "scan" && !images.is_empty() => {
            let camera = ImageFiles::new(images.iter().map(PathBuf::from));
            match login::scan_login(&store, camera, &CancelToken::new())? {
                Some(email) => println!("Login successful! Welcome, {}", email),
                None => println!("Scan cancelled."),
            }
        }
        [cmd, name, date] if cmd == "search" => {
            let id = parse_store(name)?;
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
            let table = query::filter_by_date(&store, id, date)?;

            println!("Data for {}", date);
            if table.is_empty() {
                println!("No records found for the selected date.");
            } else {
                println!("{}", table.columns.join("\t"));
                for row in &table.rows {
                    let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                    println!("{}", cells.join("\t"));
                }
            }
        }
        [cmd, name] if cmd == "next-serial" => {
            let id = parse_store(name)?;
            println!("{}", sequence::next_serial(&store, id));
        }
        _ => return Err(USAGE.into()),
    }

    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
