//! End-to-end runs of the multi-day engine with stub collaborators.

use rand::rngs::StdRng;
use u_delivery::collection::{CollectionPoint, DiversionOrder};
use u_delivery::distance::{
    Bounds, CostMatrix, EuclideanGeometry, GeometryError, GeometryProvider, TravelMatrices,
    VIRTUAL_ARC_COST,
};
use u_delivery::engine::{
    AbortReason, CollectionConfig, JsonLinesSink, Simulation, SimulationConfig, Termination,
    UniformArrivals,
};
use u_delivery::models::{
    Location, NewPackage, Package, PackageId, PackageKind, RoutingSolution, TimeWindow,
};
use u_delivery::routing::{
    NearestNeighborOptimizer, OptimizationRequest, OptimizeError, RouteOptimizer, RoutingPlan,
};
use u_delivery::simulation::{reroute, MissingWindow, RouteContext, TimeWindowPolicy};

fn tw(ready: f64, due: f64) -> TimeWindow {
    TimeWindow::new(ready, due).expect("valid")
}

fn config(days: usize) -> SimulationConfig {
    SimulationConfig::default()
        .with_days(days)
        .with_seed(17)
        .with_day_span(0.0, 1000.0)
}

/// Visits every non-depot position in index order with a single vehicle.
fn route_everything(req: &OptimizationRequest<'_>) -> Result<RoutingPlan, OptimizeError> {
    let depot = req.depots[0];
    let mut route = vec![depot];
    route.extend((0..req.size()).filter(|i| !req.depots.contains(i)));
    route.push(depot);
    Ok(RoutingPlan {
        solution: RoutingSolution::new(vec![route]),
        unscheduled: vec![],
    })
}

/// Euclidean geometry that fails from the `fail_from`-th call on.
struct FlakyGeometry {
    inner: EuclideanGeometry,
    calls: usize,
    fail_from: usize,
}

impl GeometryProvider for FlakyGeometry {
    fn matrices(&mut self, locations: &[Location]) -> Result<TravelMatrices, GeometryError> {
        self.calls += 1;
        if self.calls >= self.fail_from {
            return Err(GeometryError::Unavailable("routing service down".into()));
        }
        self.inner.matrices(locations)
    }

    fn distances_from(
        &mut self,
        origin: Location,
        targets: &[Location],
    ) -> Result<Vec<f64>, GeometryError> {
        self.inner.distances_from(origin, targets)
    }
}

/// Plays back a fixed day plan and hands one-vehicle rerouting requests to
/// a real optimizer.
struct Scripted {
    plan: Vec<Vec<usize>>,
    rerouter: NearestNeighborOptimizer,
    reroutes: usize,
}

impl RouteOptimizer for Scripted {
    fn optimize(
        &mut self,
        request: &OptimizationRequest<'_>,
    ) -> Result<RoutingPlan, OptimizeError> {
        if request.max_vehicles == Some(1) {
            self.reroutes += 1;
            return self.rerouter.optimize(request);
        }
        Ok(RoutingPlan {
            solution: RoutingSolution::new(self.plan.clone()),
            unscheduled: vec![],
        })
    }
}

#[test]
fn test_late_package_is_futile_and_retried() {
    // 5 units from the depot at speed 1: arrival at 5, window closes at 3
    let late = Package::delivery(PackageId(1), Location::new(5.0, 0.0), tw(2.0, 3.0), 0);
    let run = Simulation::builder(config(1).with_policy(TimeWindowPolicy::ArrivalSkip))
        .depot(Location::new(0.0, 0.0))
        .package(late.clone())
        .geometry(EuclideanGeometry::new(1.0))
        .optimizer(route_everything)
        .build()
        .expect("valid")
        .run()
        .expect("valid");

    assert_eq!(run.metrics.len(), 1);
    let day0 = &run.metrics[0];
    assert_eq!(day0.futile_deliveries, vec![1]);
    assert!(day0.delivered.is_empty());
    assert_eq!(day0.undelivered.time_window, vec![[2, 3]]);
    let kept = &run.registry.packages()[1];
    assert_eq!(kept.id(), PackageId(1));
    assert_eq!(kept.futile_count(), 1);

    let run = Simulation::builder(config(2).with_policy(TimeWindowPolicy::ArrivalSkip))
        .depot(Location::new(0.0, 0.0))
        .package(late)
        .geometry(EuclideanGeometry::new(1.0))
        .optimizer(route_everything)
        .build()
        .expect("valid")
        .run()
        .expect("valid");
    assert_eq!(run.metrics[1].package_count, 1);
    assert_eq!(run.metrics[1].undelivered.days_taken, vec![1]);
    assert_eq!(run.registry.packages()[1].futile_count(), 2);
}

#[test]
fn test_geometry_failure_returns_partial_metrics() {
    let geometry = FlakyGeometry {
        inner: EuclideanGeometry::new(1.0),
        calls: 0,
        fail_from: 2,
    };
    let arrivals = |day: usize, _: &mut StdRng| {
        vec![NewPackage::new(Location::new(day as f64 + 1.0, 1.0), tw(0.0, 1000.0))]
    };
    let run = Simulation::builder(config(5))
        .depot(Location::new(0.0, 0.0))
        .geometry(geometry)
        .optimizer(NearestNeighborOptimizer::new(2))
        .arrivals(arrivals)
        .build()
        .expect("valid")
        .run()
        .expect("partial result, not an error");

    assert_eq!(run.metrics.len(), 1);
    assert_eq!(run.metrics[0].day, 0);
    assert!(matches!(
        run.termination,
        Termination::Aborted {
            day: 1,
            reason: AbortReason::Geometry(GeometryError::Unavailable(_))
        }
    ));
}

#[test]
fn test_out_of_bounds_arrival_aborts_gracefully() {
    let region = Bounds::new(Location::new(-10.0, -10.0), Location::new(10.0, 10.0));
    let arrivals = |day: usize, _: &mut StdRng| {
        let x = if day == 2 { 50.0 } else { 1.0 };
        vec![NewPackage::new(Location::new(x, 0.0), tw(0.0, 1000.0))]
    };
    let run = Simulation::builder(config(4))
        .depot(Location::new(0.0, 0.0))
        .geometry(EuclideanGeometry::new(1.0).with_bounds(region))
        .optimizer(NearestNeighborOptimizer::new(1))
        .arrivals(arrivals)
        .build()
        .expect("valid")
        .run()
        .expect("valid");
    assert_eq!(run.days_completed(), 2);
    assert!(matches!(
        run.termination,
        Termination::Aborted {
            day: 2,
            reason: AbortReason::Geometry(GeometryError::OutOfBounds { .. })
        }
    ));
}

#[test]
fn test_arrival_wait_waits_for_window() {
    let early = Package::delivery(PackageId(1), Location::new(5.0, 0.0), tw(10.0, 20.0), 0);
    let run = Simulation::builder(config(1).with_policy(TimeWindowPolicy::ArrivalWait))
        .depot(Location::new(0.0, 0.0))
        .package(early)
        .geometry(EuclideanGeometry::new(1.0))
        .optimizer(route_everything)
        .build()
        .expect("valid")
        .run()
        .expect("valid");

    let day0 = &run.metrics[0];
    assert_eq!(day0.futile_deliveries, vec![0]);
    assert_eq!(day0.delivered.len(), 1);
    // wait until 10, deliver, 5 back
    assert_eq!(day0.per_vehicle_time, vec![15]);
    assert_eq!(day0.per_vehicle_distance, vec![10]);
    assert_eq!(run.registry.non_depot_count(), 0);
}

#[test]
fn test_reroute_round_trip() {
    let rows: Vec<Vec<f64>> = (0..5)
        .map(|i| (0..5).map(|j| (i as f64 - j as f64).abs()).collect())
        .collect();
    let m = CostMatrix::from_rows(&rows).expect("square");
    let matrices = TravelMatrices::new(m.clone(), m);
    let mut windows = vec![tw(0.0, 1000.0); 5];
    windows[2] = tw(0.0, 1.0);
    let ctx = RouteContext {
        matrices: &matrices,
        time_windows: &windows,
        depots: &[0],
        day: 0,
        arrival_days: &[0; 5],
        futile_counts: &[0; 5],
        missing_window: MissingWindow::Futile,
    };

    // vehicle sits at 3 at time 3 and gives up on 2
    let route = [0, 3, 2, 1, 4, 0];
    let continuation = reroute(&ctx, 3, &route[3..], 3.0, &mut NearestNeighborOptimizer::new(1))
        .expect("valid");
    assert_eq!(continuation, vec![4, 1, 0]);

    // sliced as [end depot, current, rest...]; only the forced arcs are free
    let augmented = matrices.distance.submatrix(&[0, 3, 1, 4]).with_virtual_depot(1, 0);
    let v = augmented.size() - 1;
    for k in 0..augmented.size() {
        let out = augmented.get(v, k);
        let into = augmented.get(k, v);
        assert_eq!(out, if k == 1 { 0.0 } else { VIRTUAL_ARC_COST });
        assert_eq!(into, if k == 0 { 0.0 } else { VIRTUAL_ARC_COST });
    }
}

#[test]
fn test_departure_policy_reroutes_mid_route() {
    let packages = [1.0, 2.0, 3.0, 4.0];
    let config = config(1).with_policy(TimeWindowPolicy::DepartureWaitReroute);
    let mut builder = Simulation::builder(config)
        .depot(Location::new(0.0, 0.0))
        .geometry(EuclideanGeometry::new(1.0));
    for (i, &x) in packages.iter().enumerate() {
        let window = if i == 1 { tw(0.0, 1.0) } else { tw(0.0, 1000.0) };
        builder = builder.package(Package::delivery(
            PackageId(i as u64 + 1),
            Location::new(x, 0.0),
            window,
            0,
        ));
    }
    let mut scripted = Scripted {
        plan: vec![vec![0, 3, 2, 1, 4, 0]],
        rerouter: NearestNeighborOptimizer::new(1),
        reroutes: 0,
    };
    let run = builder
        .optimizer(|req: &OptimizationRequest<'_>| scripted.optimize(req))
        .build()
        .expect("valid")
        .run()
        .expect("valid");

    assert_eq!(scripted.reroutes, 1);
    let day0 = &run.metrics[0];
    assert_eq!(day0.futile_deliveries, vec![1]);
    assert_eq!(day0.delivered.len(), 3);
    // 0 → 3 → 4 → 1 → 0
    assert_eq!(day0.per_vehicle_distance, vec![8]);
    assert_eq!(run.registry.non_depot_count(), 1);
    assert_eq!(run.registry.packages()[1].id(), PackageId(2));
    assert_eq!(run.registry.packages()[1].futile_count(), 1);
}

#[test]
fn test_same_seed_same_metrics() {
    let run_once = || {
        let region = Bounds::new(Location::new(-500.0, -500.0), Location::new(500.0, 500.0));
        let config = config(6)
            .with_replications(3)
            .with_failure_probability(0.3)
            .with_collection(CollectionConfig::new(vec![
                CollectionPoint::new(Location::new(100.0, 100.0), 4),
                CollectionPoint::new(Location::new(-100.0, -100.0), 4),
            ]));
        let arrivals = UniformArrivals::new(region, tw(0.0, 1000.0))
            .with_per_day(3, 8)
            .with_alternate_probability(0.2);
        let mut out = Vec::new();
        let run = Simulation::builder(config)
            .depot(Location::new(0.0, 0.0))
            .geometry(EuclideanGeometry::new(5.0).with_bounds(region))
            .optimizer(NearestNeighborOptimizer::new(2))
            .arrivals(arrivals)
            .sink(JsonLinesSink::new(&mut out))
            .build()
            .expect("valid")
            .run()
            .expect("valid");
        assert!(run.is_complete());
        assert_eq!(run.metrics.len(), 18);
        out
    };

    let first = run_once();
    let second = run_once();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_depots_survive_every_day() {
    let region = Bounds::new(Location::new(-50.0, -50.0), Location::new(50.0, 50.0));
    let run = Simulation::builder(config(8).with_failure_probability(0.5))
        .depots([Location::new(0.0, 0.0), Location::new(10.0, 10.0)])
        .geometry(EuclideanGeometry::new(1.0))
        .optimizer(NearestNeighborOptimizer::new(3))
        .arrivals(UniformArrivals::new(region, tw(0.0, 1000.0)).with_per_day(2, 6))
        .build()
        .expect("valid")
        .run()
        .expect("valid");

    assert!(run.is_complete());
    assert_eq!(run.registry.num_depots(), 2);
    let depots = &run.registry.packages()[..2];
    assert!(depots.iter().all(|p| p.kind() == PackageKind::Depot));
    assert_eq!(depots[0].id(), PackageId(0));
    assert_eq!(depots[1].id(), PackageId(1));
    assert!(run.registry.packages()[2..].iter().all(|p| !p.is_depot()));
}

#[test]
fn test_package_count_is_conserved() {
    const PER_DAY: usize = 3;
    let arrivals = |day: usize, _: &mut StdRng| {
        (0..PER_DAY)
            .map(|k| {
                let x = ((day * PER_DAY + k) % 7) as f64 * 10.0 - 30.0;
                let ready = (k * 200) as f64;
                NewPackage::new(Location::new(x, 5.0), tw(ready, ready + 150.0))
            })
            .collect::<Vec<_>>()
    };
    let run = Simulation::builder(config(7).with_failure_probability(0.4))
        .depot(Location::new(0.0, 0.0))
        .geometry(EuclideanGeometry::new(1.0))
        .optimizer(NearestNeighborOptimizer::new(1))
        .arrivals(arrivals)
        .build()
        .expect("valid")
        .run()
        .expect("valid");

    assert_eq!(run.metrics.len(), 7);
    for pair in run.metrics.windows(2) {
        let (today, tomorrow) = (&pair[0], &pair[1]);
        assert_eq!(
            tomorrow.package_count,
            today.package_count - today.delivered.len() + PER_DAY
        );
    }
    let last = &run.metrics[6];
    assert_eq!(
        run.registry.non_depot_count(),
        last.package_count - last.delivered.len()
    );
}

#[test]
fn test_collection_points_never_overfill() {
    let region = Bounds::new(Location::new(-100.0, -100.0), Location::new(100.0, 100.0));
    let collection = CollectionConfig::new(vec![
        CollectionPoint::new(Location::new(50.0, 50.0), 2),
        CollectionPoint::new(Location::new(-50.0, -50.0), 3),
    ])
    .with_diversion_order(DiversionOrder::GroupThenDivert);
    // nobody is ever home, so every scheduled package turns futile
    let config = config(6)
        .with_failure_probability(1.0)
        .with_collection(collection);
    let run = Simulation::builder(config)
        .depot(Location::new(0.0, 0.0))
        .geometry(EuclideanGeometry::new(1.0).with_bounds(region))
        .optimizer(NearestNeighborOptimizer::new(2))
        .arrivals(UniformArrivals::new(region, tw(0.0, 1000.0)).with_per_day(4, 6))
        .build()
        .expect("valid")
        .run()
        .expect("valid");

    let allocator = run.collection.expect("collection configured");
    assert!(allocator.resident_count() > 0);
    for point in allocator.points() {
        assert!(point.len() <= point.capacity());
    }
    assert!(run.metrics.iter().all(|m| m.delivered.is_empty()));
}
