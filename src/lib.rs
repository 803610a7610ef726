//! # docqa
//!
//! Document question answering over uploaded files using retrieval-augmented
//! generation.
//!
//! Uploaded PDF, DOCX, and TXT files are extracted, split into overlapping
//! chunks, embedded, and stored in a persistent vector index. Questions are
//! answered by retrieving the closest chunks and prompting a language model
//! with them; every answer lists the chunks it was drawn from.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────┐   ┌────────────┐
//! │  Upload  │──▶│ Extract → Chunk → Embed  │──▶│   SQLite   │
//! │ validate │   │        (ingest)          │   │ docs + vec │
//! └──────────┘   └──────────────────────────┘   └─────┬──────┘
//!                                                     │
//!               ┌──────────────────────────┐          │
//!  question ───▶│ small talk? → search →   │◀─────────┘
//!               │ prompt → generate (rag)  │
//!               └──────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa init
//! docqa upload ./handbook.pdf
//! docqa query "What is the vacation policy?" --top-k 3
//! docqa serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`extract`] | Text extraction from PDF, DOCX, TXT |
//! | [`chunk`] | Recursive overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index (SQLite and in-memory) |
//! | [`ingest`] | Ingestion pipeline |
//! | [`smalltalk`] | Small-talk classifier |
//! | [`llm`] | Generative model providers |
//! | [`rag`] | Query engine |
//! | [`documents`] | Document metadata store |
//! | [`upload`] | Upload limits and file store |
//! | [`service`] | Document lifecycle |
//! | [`app`] | Startup wiring |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Tracing setup |

pub mod app;
pub mod chunk;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod rag;
pub mod server;
pub mod service;
pub mod smalltalk;
pub mod upload;
