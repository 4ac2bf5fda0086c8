//! The [`Report`] type, which reports a chained error nicely.

use std::error::Error as StdError;
use std::fmt::{self, Display};

/// Wraps any error, providing a nicely-reporting `Display` impl that walks
/// the whole `source()` chain.
#[derive(Debug, Copy, Clone)]
pub struct Report<E>(pub E)
where
    E: AsRef<dyn StdError>;

impl<E> Display for Report<E>
where
    E: AsRef<dyn StdError>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn inner(mut e: &dyn StdError, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "error")?;
            let mut last = String::new();
            loop {
                let this = e.to_string();
                if !last.contains(&this) {
                    write!(f, ": {}", &this)?;
                }
                last = this;

                if let Some(next) = e.source() {
                    e = next;
                } else {
                    break;
                }
            }
            Ok(())
        }

        inner(self.0.as_ref(), f)
    }
}

/// Report the error to stderr, with the calling binary's name, and exit.
///
/// Does not return; the return type is generic for convenience with
/// `unwrap_or_else`.
pub fn report_and_exit<E, R>(e: E) -> R
where
    E: AsRef<dyn StdError>,
{
    if let Some(progname) = std::env::args().next() {
        eprint!("{}: ", progname);
    }
    eprintln!("{}", Report(e));
    std::process::exit(1)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io;
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("terse")]
    struct TerseError {
        #[from]
        source: Box<dyn StdError>,
    }

    #[derive(Error, Debug)]
    #[error("shallow")]
    struct ShallowError;

    fn chk<E: StdError + 'static>(e: E, expected: &str) {
        let e: Box<dyn StdError> = Box::new(e);
        let got = Report(&e).to_string();
        assert_eq!(got, expected, "mismatch: {:?}", &e);
    }

    #[test]
    fn chains_sources() {
        chk(ShallowError, "error: shallow");
        let terse = TerseError {
            source: ShallowError.into(),
        };
        chk(terse, "error: terse: shallow");
        chk(
            io::Error::new(io::ErrorKind::Other, ShallowError),
            "error: shallow",
        );
    }
}
