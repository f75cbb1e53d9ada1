use std::time::Duration;

use flowgraph::{Network, NetworkOptions, PortNo, TopologyEvent, TopologyOptions};

use crate::{forwarding, ingress, port, sw};

fn network(expiry: Duration) -> Network {
    Network::new(NetworkOptions::default().topology(TopologyOptions::default().event_expiry(expiry)))
}

#[test]
fn link_before_ports_within_expiry() {
    let network = network(Duration::from_secs(3));
    let r1 = network.rules().add_rule_node(forwarding(1, 1, "xxxx", 1)).unwrap();
    let r2 = network.rules().add_rule_node(ingress(2, 1, "xxxx", 2)).unwrap();

    network.apply_topology([
        TopologyEvent::SwitchUp(sw(1)),
        TopologyEvent::SwitchUp(sw(2)),
        TopologyEvent::LinkUp { src: port(1, 1), dst: port(2, 2) },
    ]);
    assert!(network.topology().links().is_empty());
    assert!(network.rules().next_hops(r1).is_empty());

    network
        .apply_topology([TopologyEvent::PortUp(port(2, 2)), TopologyEvent::PortUp(port(1, 1))]);
    assert_eq!(network.topology().linked_port(port(1, 1)), Some(port(2, 2)));
    assert_eq!(network.rules().next_hops(r1), vec![r2]);
    assert!(network.topology().pending_events().is_empty());
}

#[test]
fn link_before_ports_after_expiry() {
    let network = network(Duration::from_millis(30));
    let r1 = network.rules().add_rule_node(forwarding(1, 1, "xxxx", 1)).unwrap();
    network.rules().add_rule_node(ingress(2, 1, "xxxx", 2)).unwrap();

    network.apply_topology([
        TopologyEvent::SwitchUp(sw(1)),
        TopologyEvent::SwitchUp(sw(2)),
        TopologyEvent::LinkUp { src: port(1, 1), dst: port(2, 2) },
    ]);
    std::thread::sleep(Duration::from_millis(100));
    network
        .apply_topology([TopologyEvent::PortUp(port(1, 1)), TopologyEvent::PortUp(port(2, 2))]);

    assert!(network.topology().links().is_empty());
    assert!(network.rules().next_hops(r1).is_empty());
    assert!(network.rules().is_output_rule_node(r1));
    assert_eq!(network.topology().stats().expired(), 1);
}

#[test]
fn whole_batch_out_of_order() {
    let network = network(Duration::from_secs(3));

    let mut events = vec![
        TopologyEvent::LinkUp { src: port(1, 1), dst: port(2, 2) },
        TopologyEvent::LinkUp { src: port(2, 2), dst: port(1, 1) },
        TopologyEvent::PortUp(port(1, 1)),
        TopologyEvent::PortUp(port(2, 2)),
    ];
    events.extend([TopologyEvent::SwitchUp(sw(2)), TopologyEvent::SwitchUp(sw(1))]);
    network.apply_topology(events);

    let topology = network.topology();
    assert_eq!(topology.links().len(), 2);
    assert_eq!(topology.link(sw(2), sw(1)), Some((PortNo::new(2), PortNo::new(1))));
    assert!(topology.outer_ports().is_empty());
    assert_eq!(topology.stats().retried(), 4);
}
