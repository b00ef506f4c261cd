//! # Network Module
//!
//! Everything that talks to the server of record.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         NETWORK LAYER                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌───────────────────────┐        ┌───────────────────────────────┐    │
//! │  │  ConnectivityProbe    │        │  CloudSync / AuthService      │    │
//! │  │  GET /health          │        │  user-data, auth endpoints    │    │
//! │  │  bounded by timeout   │        │                               │    │
//! │  └───────────┬───────────┘        └───────────────┬───────────────┘    │
//! │              │                                    │                    │
//! │              └──────────────┬─────────────────────┘                    │
//! │                             ▼                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  RemoteApi (trait)                                              │   │
//! │  │  HttpRemote   - reqwest against the real server                 │   │
//! │  │  FakeRemote   - scripted, in-process (testing module)           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Endpoints
//!
//! | Method | Path                    | Auth   | Used by            |
//! |--------|-------------------------|--------|--------------------|
//! | GET    | `/health`               | none   | connectivity probe |
//! | POST   | `/api/user-data`        | bearer | cloud save         |
//! | GET    | `/api/user-data/{id}`   | bearer | cloud load         |
//! | DELETE | `/api/user-data`        | bearer | clear all data     |
//! | POST   | `/api/auth/register`    | none   | cloud register     |
//! | POST   | `/api/auth/login`       | none   | cloud login        |
//! | POST   | `/api/auth/logout`      | bearer | cloud logout       |

pub mod connectivity;
pub mod protocol;
pub mod remote;

pub use connectivity::ConnectivityProbe;
pub use protocol::{AuthResponse, LoginRequest, RegisterRequest, RemoteUser};
pub use remote::{HttpRemote, RemoteApi};
