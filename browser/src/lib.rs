//! Chromium DevTools implementation of the recorder's `PageDriver`.

mod chrome;
mod selector;

pub use chrome::ChromeDriver;
pub use selector::text_xpath;
