mod movie;
mod page;
mod rating;

pub use movie::{Movie, MovieWithRatings, NewMovie};
pub use page::Page;
pub use rating::{Rating, Stars};
