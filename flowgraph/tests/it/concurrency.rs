use std::sync::atomic::{AtomicUsize, Ordering};

use flowgraph::{Network, NetworkOptions, RuleGraphError, TopologyEvent, TopologyOptions};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    forwarding, ingress, link_up,
    overlap::{check, random_match},
    port, sw,
};

const ROUNDS: u16 = 60;
const FLAPS: usize = 40;
const READERS: usize = 3;

#[test]
fn concurrent_readers_and_writers() {
    let _ = tracing_subscriber::fmt::try_init();

    let network = Network::new(
        NetworkOptions::default().topology(TopologyOptions::default().apply_down_events(true)),
    );
    network.apply_topology(link_up(port(1, 1), port(2, 2)));

    let writers_done = AtomicUsize::new(0);

    std::thread::scope(|s| {
        // Rules on both ends of the link, every third one removed again.
        s.spawn(|| {
            let rules = network.rules();
            let mut rng = StdRng::seed_from_u64(7);
            let mut installed = Vec::new();

            for priority in 0..ROUNDS {
                for node in [
                    forwarding(1, priority, &random_match(&mut rng), 1),
                    ingress(2, priority, &random_match(&mut rng), 2),
                ] {
                    match rules.add_rule_node(node.clone()) {
                        Ok(_) => installed.push(node),
                        Err(RuleGraphError::Duplicate(_)) => {}
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                }

                if priority % 3 == 0 && !installed.is_empty() {
                    let node = installed.swap_remove(rng.gen_range(0..installed.len()));
                    rules.remove_rule_node(&node, true).unwrap();
                }
            }

            writers_done.fetch_add(1, Ordering::Release);
        });

        // Link flaps, ending with the link up.
        s.spawn(|| {
            let link = TopologyEvent::LinkUp { src: port(1, 1), dst: port(2, 2) };
            for _ in 0..FLAPS {
                network
                    .apply_topology([TopologyEvent::LinkDown { src: port(1, 1), dst: port(2, 2) }]);
                network.apply_topology([link]);
            }

            writers_done.fetch_add(1, Ordering::Release);
        });

        for _ in 0..READERS {
            s.spawn(|| {
                let rules = network.rules();
                while writers_done.load(Ordering::Acquire) < 2 {
                    for id in rules.switch_rules(sw(1)) {
                        for next in rules.next_hops(id) {
                            let _ = rules.rule(next);
                        }
                        if let Some(node) = rules.rule(id) {
                            assert_eq!(node.switch(), sw(1));
                        }
                    }
                    assert!(rules.input_rule_nodes(8).len() <= 8);
                    assert!(rules.output_rule_nodes(8).len() <= 8);
                    let _ = network.topology().linked_port(port(1, 1));
                }
            });
        }
    });

    assert_eq!(network.topology().linked_port(port(1, 1)), Some(port(2, 2)));
    assert_eq!(network.topology().stats().rejected(), 0);
    check(&network);
}
