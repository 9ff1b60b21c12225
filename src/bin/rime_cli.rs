use std::error::Error;
use std::io;
use std::net::SocketAddr;

use clap::Parser;

use rime::{Connection, Reply, cli};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address of the server to connect to
    address: SocketAddr,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = Cli::parse();
    let mut conn = Connection::open(args.address)?;
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();

    loop {
        let command = match cli::prompt(&mut stdin, &mut stdout) {
            Ok(command) => command,
            Err(err) => {
                eprintln!("error: {err}");
                continue;
            }
        };

        let Some(query) = command.into_query() else {
            break;
        };

        match conn.run(&query) {
            Ok(Reply::Value(value)) => println!("{value}"),
            Ok(Reply::Rows(mut rows)) => {
                for item in rows.iter() {
                    match item {
                        Ok(value) => println!("{value}"),
                        Err(err) => {
                            eprintln!("error: {err}");
                            break;
                        }
                    }
                }
            }
            Ok(Reply::Empty) => {}
            Err(err) => report(err)?,
        }
    }

    conn.close();
    Ok(())
}

/// Query errors are printed with their caret-annotated location and the
/// session continues; anything else is fatal.
fn report(err: rime::Error) -> Result<(), rime::Error> {
    match err {
        rime::Error::BadQuery(ref query_err) | rime::Error::Execution(ref query_err) => {
            eprintln!("error: {err}");
            match query_err.location() {
                Ok(location) => eprintln!("{location}"),
                Err(render_err) => eprintln!("cannot render location: {render_err}"),
            }
            Ok(())
        }
        other => Err(other),
    }
}
