pub mod normalize;
pub mod product;
pub mod product_page;

pub use normalize::{cleanse_url, extract_asin, normalize_price, parse_rating, product_url};
pub use product::{ListingDetails, ProductRecord, MISSING_RATING, NO_DESCRIPTION};
pub use product_page::{selectors, PageChallenge, ProductPageParser};
