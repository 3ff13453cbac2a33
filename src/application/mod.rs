//! Application services: the cached read paths, engagement counters, comment
//! threads and admin mutations, all written against the storage traits in
//! [`repos`].

pub mod admin;
pub mod comments;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod pagination;
pub mod query;
pub mod repos;
