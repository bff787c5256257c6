//! Small helpers shared by the library and the command-line front end.
//!
//! - **URL validation**: keeps image probing on public http(s) hosts
//! - **Text**: sanitizes and truncates feed text for terminal output

mod text;
mod url_validator;

pub use text::display_line;
pub use url_validator::{validate_image_url, UrlValidationError};
