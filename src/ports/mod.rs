//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `PriceSource`: One upstream origin producing a normalized `PriceRecord`
//! - `HistoryRepository`: Durable snapshot of the change history
//! - `Clock`: Local wall-clock time (fixed UTC offset)

pub mod clock;
pub mod history_repository;
pub mod price_source;
