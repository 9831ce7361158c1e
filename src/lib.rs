#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use shib_app as app;
pub use shib_reflect as reflect;
pub use shib_utils as utils;
