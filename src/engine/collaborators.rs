//! Collaborators the engine calls but does not own the logic of.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::distance::{Bounds, CostMatrix};
use crate::models::{Location, NewPackage, RoutingSolution, TimeWindow};

/// Produces each day's new packages.
///
/// Called once per day, for every day, before the first day is routed.
/// Implementations must draw randomness only from `rng`.
pub trait ArrivalGenerator {
    /// Packages arriving on `day`.
    fn generate(&mut self, day: usize, rng: &mut StdRng) -> Vec<NewPackage>;
}

impl<F> ArrivalGenerator for F
where
    F: FnMut(usize, &mut StdRng) -> Vec<NewPackage>,
{
    fn generate(&mut self, day: usize, rng: &mut StdRng) -> Vec<NewPackage> {
        self(day, rng)
    }
}

/// No package ever arrives.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArrivals;

impl ArrivalGenerator for NoArrivals {
    fn generate(&mut self, _day: usize, _rng: &mut StdRng) -> Vec<NewPackage> {
        Vec::new()
    }
}

/// Packages scattered uniformly over a rectangle, with uniformly placed
/// fixed-length windows inside the working day.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use u_delivery::distance::Bounds;
/// use u_delivery::engine::{ArrivalGenerator, UniformArrivals};
/// use u_delivery::models::{Location, TimeWindow};
///
/// let region = Bounds::new(Location::new(0.0, 0.0), Location::new(100.0, 100.0));
/// let span = TimeWindow::new(0.0, 480.0).unwrap();
/// let mut arrivals = UniformArrivals::new(region, span).with_per_day(3, 3);
/// let batch = arrivals.generate(0, &mut StdRng::seed_from_u64(1));
/// assert_eq!(batch.len(), 3);
/// assert!(batch.iter().all(|p| region.contains(&p.location)));
/// ```
#[derive(Debug, Clone)]
pub struct UniformArrivals {
    region: Bounds,
    day_span: TimeWindow,
    min_per_day: usize,
    max_per_day: usize,
    window_length: f64,
    alternate_probability: f64,
}

impl UniformArrivals {
    /// Creates a generator over `region` for the given working day.
    pub fn new(region: Bounds, day_span: TimeWindow) -> Self {
        Self {
            region,
            day_span,
            min_per_day: 5,
            max_per_day: 15,
            window_length: (day_span.due() - day_span.ready()) / 4.0,
            alternate_probability: 0.0,
        }
    }

    /// Sets the inclusive range of daily arrivals.
    pub fn with_per_day(mut self, min: usize, max: usize) -> Self {
        self.min_per_day = min.min(max);
        self.max_per_day = max.max(min);
        self
    }

    /// Sets the length of each delivery window.
    pub fn with_window_length(mut self, length: f64) -> Self {
        self.window_length = length.max(0.0);
        self
    }

    /// Sets the chance that a customer also gives an alternate address.
    pub fn with_alternate_probability(mut self, p: f64) -> Self {
        self.alternate_probability = p.clamp(0.0, 1.0);
        self
    }

    fn location(&self, rng: &mut StdRng) -> Location {
        Location::new(
            rng.random_range(self.region.min.x..=self.region.max.x),
            rng.random_range(self.region.min.y..=self.region.max.y),
        )
    }

    fn window(&self, rng: &mut StdRng) -> TimeWindow {
        let open = self.day_span.ready();
        let close = self.day_span.due();
        let latest = (close - self.window_length).max(open);
        let ready = rng.random_range(open..=latest);
        TimeWindow::new(ready, (ready + self.window_length).min(close)).unwrap_or(self.day_span)
    }
}

impl ArrivalGenerator for UniformArrivals {
    fn generate(&mut self, day: usize, rng: &mut StdRng) -> Vec<NewPackage> {
        let count = rng.random_range(self.min_per_day..=self.max_per_day);
        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            let window = self.window(rng);
            let index = batch.len();
            batch.push(NewPackage::new(self.location(rng), window));
            if self.alternate_probability > 0.0
                && rng.random::<f64>() < self.alternate_probability
            {
                let mut alternate = NewPackage::new(self.location(rng), window);
                alternate.alternates.push(index);
                batch[index].alternates.push(index + 1);
                batch.push(alternate);
            }
        }
        debug!(day, count = batch.len(), "arrivals generated");
        batch
    }
}

/// Looks at each day's routes. Never affects the simulation.
pub trait RouteObserver {
    /// Called once per day after routing, with the registry locations and
    /// the distance matrix the routes were planned on.
    fn on_routes(
        &mut self,
        day: usize,
        solution: &RoutingSolution,
        locations: &[Location],
        weights: &CostMatrix,
    );
}

impl<F> RouteObserver for F
where
    F: FnMut(usize, &RoutingSolution, &[Location], &CostMatrix),
{
    fn on_routes(
        &mut self,
        day: usize,
        solution: &RoutingSolution,
        locations: &[Location],
        weights: &CostMatrix,
    ) {
        self(day, solution, locations, weights)
    }
}

/// Logs every planned route at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RouteObserver for TracingObserver {
    fn on_routes(
        &mut self,
        day: usize,
        solution: &RoutingSolution,
        _locations: &[Location],
        weights: &CostMatrix,
    ) {
        for (vehicle, route) in solution.routes().iter().enumerate() {
            let planned: f64 = route.windows(2).map(|leg| weights.get(leg[0], leg[1])).sum();
            debug!(day, vehicle, ?route, planned, "route planned");
        }
    }
}
