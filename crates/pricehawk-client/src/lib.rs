pub mod extractor;
pub mod fetcher;
pub mod identity;
pub mod notifier;

pub use extractor::{PRICE_SELECTORS, SelectorExtractor};
pub use fetcher::ReqwestFetcher;
pub use identity::{BrowserProfile, IdentityPool, draw_identity};
pub use notifier::{LogNotifier, SendGridNotifier};
