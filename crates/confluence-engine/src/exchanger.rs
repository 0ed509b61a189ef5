//! The exchanger contract consumed by the run loop.

use confluence_core::Category;

/// Routes named variables produced by one component to the inputs of
/// others.
///
/// The engine only pulls: within one supermesh tick, every due
/// component's outbound transfers are handed back to the driver, which
/// feeds them to the exchanger before the next due component runs. How
/// the exchanger remaps, aggregates, or lags values between grids and
/// timesteps is a collaborator concern.
pub trait Exchanger {
    /// The current value of the named transfer routed to `destination`.
    ///
    /// `None` means the transfer is not (yet) available, which the
    /// engine treats as a fatal run error.
    fn transfer(&self, name: &str, destination: Category) -> Option<&[f64]>;
}
