//! # Repository Module
//!
//! Database repository implementations for the canteen POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  TicketService                                                         │
//! │       │                                                                 │
//! │       │  db.tickets().cancel(&ticket, &log)                            │
//! │       ▼                                                                 │
//! │  TicketRepository                                                      │
//! │  ├── insert_batch(&self, tickets, logs)   one transaction              │
//! │  ├── cancel(&self, ticket, log)           log first, guarded update    │
//! │  ├── mark_winner(&self, ticket, log)      guarded update               │
//! │  └── seller_report(&self, period)         GROUP BY sold_by             │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  State-changing writes carry their precondition in the WHERE clause,   │
//! │  so a racing writer turns into "0 rows affected" instead of a          │
//! │  double transition.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`TicketRepository`](ticket::TicketRepository) - Ticket lifecycle, draw, stats
//! - [`TicketConfigRepository`](ticket_config::TicketConfigRepository) - Pricing versions
//! - [`TicketLogRepository`](ticket_log::TicketLogRepository) - Audit trail
//! - [`UserRepository`](user::UserRepository) - Operator accounts

pub mod ticket;
pub mod ticket_config;
pub mod ticket_log;
pub mod user;
