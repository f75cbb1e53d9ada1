use flowgraph::{HeaderSpace, Network, RuleGraphError, RuleId, RuleNode, SwitchId};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::{forwarding, ingress, link_up, port, sw};

const WIDTH: usize = 6;

pub(crate) fn random_match(rng: &mut StdRng) -> String {
    (0..WIDTH)
        .map(|_| match rng.gen_range(0..4) {
            0 => '0',
            1 => '1',
            _ => 'x',
        })
        .collect()
}

/// Installs `count` random rules with distinct priorities on switch 1 (sent out of port 1) and
/// switch 2 (received on port 2). Duplicate matches are skipped.
fn populate(network: &Network, rng: &mut StdRng, count: u16) -> usize {
    let mut installed = 0;
    for switch in [1, 2] {
        let mut priorities: Vec<u16> = (0..count).collect();
        priorities.shuffle(rng);
        for priority in priorities {
            let s = random_match(rng);
            let node =
                if switch == 1 { forwarding(1, priority, &s, 1) } else { ingress(2, priority, &s, 2) };
            match network.rules().add_rule_node(node) {
                Ok(_) => installed += 1,
                Err(RuleGraphError::Duplicate(_)) => {}
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
    }
    installed
}

fn nodes(network: &Network, switch: SwitchId) -> Vec<(RuleId, RuleNode)> {
    let rules = network.rules();
    rules.switch_rules(switch).into_iter().filter_map(|id| Some((id, rules.rule(id)?))).collect()
}

/// Checks the really matched space of every rule, every edge and every class against their
/// definitions.
pub(crate) fn check(network: &Network) {
    let rules = network.rules();

    for switch in [sw(1), sw(2)] {
        let nodes = nodes(network, switch);
        for (_, node) in &nodes {
            let mut expected = HeaderSpace::from_array(node.match_array().clone());
            for (_, other) in &nodes {
                if other.priority() > node.priority() {
                    expected.subtract(other.match_array().clone()).unwrap();
                }
            }
            assert!(node.really_match().equivalent(&expected).unwrap(), "{node}");
        }
    }

    let upstream = nodes(network, sw(1));
    let downstream = nodes(network, sw(2));
    for (a, from) in &upstream {
        for (b, to) in &downstream {
            let expected = from.really_output().has_intersection(to.really_match()).unwrap();
            assert_eq!(rules.is_link_exist(*a, *b), expected, "{from} -> {to}");
        }
        assert_eq!(rules.is_output_rule_node(*a), rules.next_hops(*a).is_empty());
        assert!(rules.is_input_rule_node(*a));
    }
    for (b, _) in &downstream {
        assert_eq!(rules.is_input_rule_node(*b), rules.prev_hops(*b).is_empty());
        assert!(rules.is_dropping_rule_node(*b));
    }
}

#[test]
fn random_rules_keep_invariants() {
    let _ = tracing_subscriber::fmt::try_init();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let network = Network::default();
    network.apply_topology(link_up(port(1, 1), port(2, 2)));

    let installed = populate(&network, &mut rng, 24);
    assert_eq!(network.rules().rule_count(), installed);
    check(&network);

    // Strict removal of every third rule.
    for (i, (_, node)) in
        nodes(&network, sw(1)).into_iter().chain(nodes(&network, sw(2))).enumerate()
    {
        if i % 3 == 0 {
            network.rules().remove_rule_node(&node, true).unwrap();
        }
    }
    check(&network);

    // Priorities above the first batch.
    for _ in 0..8 {
        let priority = rng.gen_range(100..1000);
        let _ = network.rules().add_rule_node(forwarding(1, priority, &random_match(&mut rng), 1));
    }
    check(&network);
}

#[test]
fn insert_twice() {
    let network = Network::default();
    let first = network.rules().add_rule_node(forwarding(1, 3, "01xxxx", 1)).unwrap();
    let before = network.rules().rule(first).unwrap();

    assert_eq!(
        network.rules().add_rule_node(forwarding(1, 3, "01xxxx", 1)),
        Err(RuleGraphError::Duplicate(first))
    );
    assert_eq!(network.rules().rule(first).unwrap(), before);
    assert_eq!(network.rules().rule_count(), 1);
}

#[test]
fn higher_priority_robs_and_restores() {
    let network = Network::default();
    let rules = network.rules();

    let low = rules.add_rule_node(forwarding(1, 1, "xxxxxx", 1)).unwrap();
    let high = forwarding(1, 9, "1x0xxx", 2);
    rules.add_rule_node(high.clone()).unwrap();

    let robbed = rules.rule(low).unwrap();
    let intersection = robbed
        .really_match()
        .intersect(&HeaderSpace::from_array(high.match_array().clone()))
        .unwrap();
    assert!(intersection.is_empty());

    rules.remove_rule_node(&high, true).unwrap();
    let restored = rules.rule(low).unwrap();
    assert!(restored
        .really_match()
        .equivalent(&HeaderSpace::from_array(restored.match_array().clone()))
        .unwrap());
}

#[test]
fn equal_priority_overlap_rejected() {
    let network = Network::default();
    let rules = network.rules();

    let first = rules.add_rule_node(forwarding(1, 4, "0xxxxx", 1)).unwrap();
    let before = rules.rule(first).unwrap();

    assert_eq!(
        rules.add_rule_node(forwarding(1, 4, "00xxxx", 2)),
        Err(RuleGraphError::StructuralConflict { existing: first, priority: 4 })
    );
    assert_eq!(rules.rule(first).unwrap(), before);
    // Disjoint at equal priority is fine.
    assert!(rules.add_rule_node(forwarding(1, 4, "1xxxxx", 2)).is_ok());
}
