use flowgraph::{
    GraphEvent, Network, NetworkOptions, TopologyChange, TopologyEvent, TopologyOptions,
};

use crate::{forwarding, ingress, link_up, port, sw};

fn network() -> Network {
    Network::new(
        NetworkOptions::default().topology(TopologyOptions::default().apply_down_events(true)),
    )
}

#[test]
fn classes_follow_links() {
    let network = network();
    let rules = network.rules();

    let a = rules.add_rule_node(forwarding(1, 1, "xxxx", 1)).unwrap();
    let b = rules.add_rule_node(forwarding(2, 1, "xxxx", 3)).unwrap();
    let c = rules.add_rule_node(ingress(3, 1, "xxxx", 4)).unwrap();
    for id in [a, b, c] {
        assert!(rules.is_input_rule_node(id));
        assert!(rules.is_output_rule_node(id));
    }

    // Downstream of b.
    network.apply_topology(link_up(port(2, 3), port(3, 4)));
    assert!(!rules.is_output_rule_node(b));
    assert!(rules.is_input_rule_node(b));

    // Upstream of b, which arrives at port 2.
    network.apply_topology(link_up(port(1, 1), port(2, 2)));
    assert!(!rules.is_input_rule_node(b));
    assert_eq!(rules.next_hops(a), vec![b]);

    network
        .apply_topology([TopologyEvent::LinkDown { src: port(2, 3), dst: port(3, 4) }]);
    assert!(rules.is_output_rule_node(b));
    assert!(rules.is_input_rule_node(c));
    assert!(!rules.is_input_rule_node(b));

    network
        .apply_topology([TopologyEvent::LinkDown { src: port(1, 1), dst: port(2, 2) }]);
    assert!(rules.is_input_rule_node(b));
    assert!(rules.is_output_rule_node(a));
    assert_eq!(rules.edge_count(), 0);
}

#[test]
fn switch_down_removes_its_rules() {
    let network = network();
    let rules = network.rules();
    network.apply_topology(link_up(port(1, 1), port(2, 2)));

    let a = rules.add_rule_node(forwarding(1, 1, "xxxx", 1)).unwrap();
    let b = rules.add_rule_node(ingress(2, 1, "0xxx", 2)).unwrap();
    let c = rules.add_rule_node(ingress(2, 2, "1xxx", 2)).unwrap();
    assert_eq!(rules.next_hops(a), vec![b, c]);

    // Parked until the port and its link are down.
    network.apply_topology([TopologyEvent::SwitchDown(sw(2))]);
    assert_eq!(rules.switch_rules(sw(2)), vec![b, c]);

    network.apply_topology([
        TopologyEvent::PortDown(port(2, 2)),
        TopologyEvent::LinkDown { src: port(1, 1), dst: port(2, 2) },
    ]);
    assert!(!network.topology().contains_switch(sw(2)));
    assert!(rules.switch_rules(sw(2)).is_empty());
    assert!(rules.is_output_rule_node(a));
    assert_eq!(rules.rule_count(), 1);
}

#[tokio::test]
async fn subscriptions() {
    let network = network();
    let mut topology_rx = network.topology().subscribe();
    let mut rules_rx = network.rules().subscribe();

    let a = network.rules().add_rule_node(forwarding(1, 1, "xxxx", 1)).unwrap();
    let b = network.rules().add_rule_node(ingress(2, 1, "xxxx", 2)).unwrap();
    network.apply_topology(link_up(port(1, 1), port(2, 2)));

    let mut changes = Vec::new();
    while let Ok(change) = topology_rx.try_recv() {
        changes.push(change);
    }
    assert_eq!(changes.len(), 5);
    assert_eq!(changes[4], TopologyChange::LinkAdded { src: port(1, 1), dst: port(2, 2) });

    assert_eq!(rules_rx.recv().await, Some(GraphEvent::RuleAdded { id: a, switch: sw(1) }));
    assert_eq!(rules_rx.recv().await, Some(GraphEvent::RuleAdded { id: b, switch: sw(2) }));
    assert_eq!(rules_rx.recv().await, Some(GraphEvent::LinkAdded { from: a, to: b }));
}
