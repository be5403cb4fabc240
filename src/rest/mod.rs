mod client;

pub use client::RestQueryClient;
