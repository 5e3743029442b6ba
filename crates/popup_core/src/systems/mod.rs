//! ECS systems: event-driven coordinator logic.
//!
//! Each system reacts to the `CurrentEvent` resource, which the runner
//! inserts before every schedule execution. The pipeline stages:
//!
//! - **Arrivals** (`train_arrival`): retrofit decision and collection placement
//! - **Collection pickup** (`collection_pickup`): batch wagons to retrofit tracks
//! - **Transfers** (`transfer`): the shared locomotive trip engine
//! - **Workshop dispatch** (`workshop_dispatch`): distribute groups to stations
//! - **Retrofit completion** (`retrofit_finished`): station hand-over and exit staging
//! - **Exit haul / parking** (`exit_haul`, `parking_dispatch`): move finished
//!   rakes out of the workshop area and into parking

pub mod collection_pickup;
pub mod exit_haul;
pub mod parking_dispatch;
pub mod retrofit_finished;
pub mod simulation_started;
pub mod train_arrival;
pub mod transfer;
pub mod workshop_dispatch;
