//! Generated protobuf types backing the Fjall-persisted store (see
//! `proto/raito_store.proto`). `Job`/`Document`/`ApiKey`/`Tenant` here are
//! the wire shape; `crate::store::model` wraps them in richer Rust types
//! (typed enums, `serde_json::Value` instead of a raw JSON string) at the
//! store boundary.

#[allow(clippy::all)]
#[allow(warnings)]
mod raito_store {
    include!(concat!(env!("OUT_DIR"), "/raito.store.rs"));
}

pub use raito_store::*;
