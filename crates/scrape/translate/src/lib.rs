//! Scrape Translate - descriptor to agent scrape job translation
//!
//! [`ConfigWriter`] turns one [`MonitorDescriptor`](scrape_types::MonitorDescriptor)
//! into one [`ScrapeJobConfig`](scrape_types::ScrapeJobConfig) per endpoint.
//! Every job carries a single Prometheus scrape config whose relabel pipeline
//! is built in a fixed order:
//!
//! 1. service selector (`matchLabels` sorted by key, then `matchExpressions`)
//! 2. port selection
//! 3. topology labels (`node`, `pod`, `namespace`, `service_name`, `container`)
//! 4. service and pod target labels
//! 5. `job` label and its override
//! 6. static `endpoint` label
//! 7. the endpoint's own relabelings, then its metric relabelings
//!
//! Translation performs no I/O and holds no state beyond the remote-write
//! destination, so it is safe to call from any number of workers.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod rules;
pub mod writer;

pub use writer::{job_name, ConfigWriter};
