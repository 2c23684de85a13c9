pub(crate) mod commenters;
pub(crate) mod comments;
pub(crate) mod pages;
