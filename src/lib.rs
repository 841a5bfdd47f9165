#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! A scene-graph bridge that mirrors a retained-mode, parameterized object
//! graph into a time-varying USD stage, written incrementally to disk or a
//! remote store through a pluggable [`connection::Connection`].
//!
//! [`engine::Engine`] is the entry point: open a session against a
//! [`connection::Connection`], create objects, set their parameters and
//! references, commit data into the writer, and save.

pub mod cache;
pub mod connection;
pub mod dataarray;
pub mod diagnostic;
pub mod engine;
pub mod errors;
pub mod object;
pub mod params;
pub mod resources_registry;
pub mod settings;
pub mod stage;
pub mod timecode;
pub mod types;
pub mod volume;
pub mod writer;

pub use connection::{Connection, ConnectionSettings, LocalConnection, RemoteConnection, TestConnection, VoidConnection};
pub use diagnostic::{Diagnostic, DiagnosticLevel, DiagnosticSink, Diagnostics};
pub use engine::Engine;
pub use errors::{BridgeError, Result};
pub use object::{GeometryKind, LightKind, ObjectGraph, ObjectHandle, ObjectKind, SamplerDim};
pub use resources_registry::{ResourceKey, SharedResourceRegistry};
pub use settings::{BridgeSettings, ConnectionKind, LogLevel};
pub use timecode::TimeCode;
pub use volume::{StubVolumeWriter, VolumeData, VolumeWriter};
pub use writer::UsdWriter;
