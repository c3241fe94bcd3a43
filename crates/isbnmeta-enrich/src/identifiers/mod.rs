pub mod isbn;

pub use isbn::{
    Isbn, generate_bogus, generate_isbn13, is_isbn13_shaped, isbn13_check_digit, normalize_key,
};
