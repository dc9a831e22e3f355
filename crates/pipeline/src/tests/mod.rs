pub(crate) mod support;

mod properties;
