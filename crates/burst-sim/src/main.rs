//! Headless replica simulation.
//!
//! Seeds one replica, attaches several more, then drives them all
//! through randomized pop sessions with occasional merges, the same
//! traffic a collaborative session produces minus the rendering. At
//! the end the replicas gossip to convergence, the structural
//! invariants are checked, and any subdivisions stranded by the trim
//! race are counted before and after an explicit reconcile pass.
//!
//! Usage: `burst-sim [max_level] [seed]`

use burst_substrate::{MemoryStore, ReplicaId};
use burst_tree::{check_tree, BubbleTree, MaxLevel, Shape};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration for one simulation run.
#[derive(Debug, Clone)]
struct SimConfig {
    /// Seed for deterministic runs.
    seed: u64,
    /// Number of replicas.
    replicas: usize,
    /// Pop rounds to run.
    rounds: usize,
    /// Depth bound for the session.
    max_level: MaxLevel,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            replicas: 3,
            rounds: 200,
            max_level: MaxLevel::DEFAULT,
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "burst=info,burst_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = SimConfig::default();
    let mut args = std::env::args().skip(1);
    config.max_level = MaxLevel::from_param(args.next().as_deref());
    if let Some(seed) = args.next().and_then(|s| s.parse().ok()) {
        config.seed = seed;
    }

    run(config);
}

fn run(config: SimConfig) {
    info!(?config, "starting simulation");
    let mut rng = StdRng::seed_from_u64(config.seed);

    let seeded = BubbleTree::seed(
        MemoryStore::new(ReplicaId(0)),
        config.max_level,
        rng.gen(),
    );
    let root = seeded.root().id();
    let mut replicas = vec![seeded];
    for i in 1..config.replicas {
        let mut tree = BubbleTree::attach(
            MemoryStore::new(ReplicaId(i as u16)),
            root,
            config.max_level,
            rng.gen(),
        );
        tree.merge_from(&replicas[0]);
        replicas.push(tree);
    }

    let mut pops = 0usize;
    let mut hydrates = 0usize;
    for round in 0..config.rounds {
        let idx = rng.gen_range(0..replicas.len());
        let tree = &mut replicas[idx];
        let circles = tree.circles();
        if circles.is_empty() {
            tree.hydrate();
            hydrates += 1;
        } else {
            let (item, _) = circles[rng.gen_range(0..circles.len())];
            tree.pop(item);
            pops += 1;
        }

        if rng.gen_bool(0.3) {
            let dst = rng.gen_range(0..replicas.len());
            let src = rng.gen_range(0..replicas.len());
            merge_pair(&mut replicas, dst, src);
        }

        if round % 25 == 0 {
            for tree in &replicas {
                let violations = check_tree(tree);
                assert!(violations.is_empty(), "round {round}: {violations:?}");
            }
        }
    }
    info!(pops, hydrates, "session finished, gossiping to convergence");

    gossip(&mut replicas);
    for pair in replicas.windows(2) {
        assert!(pair[0].converged_with(&pair[1]), "replicas did not converge");
    }
    for tree in &replicas {
        let violations = check_tree(tree);
        assert!(violations.is_empty(), "converged state is invalid: {violations:?}");
    }

    let stranded = stranded_subdivisions(&replicas[0]);
    info!(stranded, "converged; empty subdivisions left by trim races");

    for tree in &mut replicas {
        tree.reconcile();
    }
    gossip(&mut replicas);
    let after = stranded_subdivisions(&replicas[0]);
    assert_eq!(after, 0, "reconcile left stranded subdivisions behind");
    info!("reconciled; no stranded subdivisions remain");
}

/// Merge `src`'s state into `dst` within one replica set.
fn merge_pair(replicas: &mut [BubbleTree<MemoryStore>], dst: usize, src: usize) -> usize {
    if dst == src {
        return 0;
    }
    let (a, b) = if dst < src {
        let (left, right) = replicas.split_at_mut(src);
        (&mut left[dst], &right[0])
    } else {
        let (left, right) = replicas.split_at_mut(dst);
        (&mut right[0], &left[src])
    };
    a.merge_from(b)
}

/// Full-mesh gossip until no merge changes anything.
fn gossip(replicas: &mut [BubbleTree<MemoryStore>]) {
    loop {
        let mut changed = 0;
        for dst in 0..replicas.len() {
            for src in 0..replicas.len() {
                changed += merge_pair(replicas, dst, src);
            }
        }
        if changed == 0 {
            break;
        }
    }
}

/// Count reachable subdivisions that are recursively empty, the
/// residue the trim race leaves behind.
fn stranded_subdivisions(tree: &BubbleTree<MemoryStore>) -> usize {
    tree.items()
        .into_iter()
        .filter(|item| {
            matches!(tree.shape(*item), Ok(Shape::Branch(_))) && tree.is_empty(*item)
        })
        .count()
}
