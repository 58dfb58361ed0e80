//! XML input and output.
//!
//! Data, edit and diff trees share one XML form: elements resolved against
//! the schema, namespaced attributes carrying the edit/diff vocabulary.

mod parser;
mod printer;

pub use parser::{parse_file, parse_str, XmlParser};
pub use printer::{print_to_string, print_to_string_pretty, XmlPrinter, XmlPrinterOptions};
