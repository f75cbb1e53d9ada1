use flowgraph::{
    convert::{IPV4_DST, VLAN_VID},
    Action, FieldLayout, FlowRule, Match, Network, PortNo, SetField,
};

use crate::{forwarding, ingress, link_up, port, sw};

#[test]
fn two_switch_scenario() {
    let _ = tracing_subscriber::fmt::try_init();
    let network = Network::default();

    let r1 = network.rules().add_rule_node(forwarding(1, 1, "xxxx", 1)).unwrap();
    let r2 = network.rules().add_rule_node(ingress(2, 1, "xxxx", 2)).unwrap();
    network.apply_topology(link_up(port(1, 1), port(2, 2)));

    let rules = network.rules();
    assert_eq!(rules.next_hops(r1), vec![r2]);
    assert_eq!(rules.prev_hops(r2), vec![r1]);
    assert!(!rules.is_output_rule_node(r1));
    assert!(!rules.is_input_rule_node(r2));
    assert_eq!(rules.input_rule_nodes(usize::MAX), vec![r1]);
    assert_eq!(rules.output_rule_nodes(usize::MAX), vec![r2]);
    assert_eq!(rules.dropping_rule_nodes(usize::MAX), vec![r2]);

    network.dump();
}

#[test]
fn flow_rules_through_field_layout() {
    let network = Network::default();
    let layout = FieldLayout::vlan_ipv4();
    network.apply_topology(link_up(port(1, 1), port(2, 2)));

    // Tags VLAN 10 traffic with a destination and sends it to switch 2.
    let tagger = FlowRule::new(sw(1), 100, Match::new().exact(VLAN_VID, 10))
        .action(Action::SetField(SetField::new(IPV4_DST, 0x0a00_0001)))
        .action(Action::Output(PortNo::new(1)));
    let tagger = network.add_flow_rule(&tagger, &layout).unwrap();

    let hit = FlowRule::new(sw(2), 100, Match::new().masked(IPV4_DST, 0x0a00_0000, 0xff00_0000))
        .in_port(PortNo::new(2));
    let hit = network.add_flow_rule(&hit, &layout).unwrap();

    let miss = FlowRule::new(sw(2), 90, Match::new().exact(IPV4_DST, 0x0b00_0001))
        .in_port(PortNo::new(2));
    let miss = network.add_flow_rule(&miss, &layout).unwrap();

    let rules = network.rules();
    assert_eq!(rules.next_hops(tagger), vec![hit]);
    assert!(rules.is_input_rule_node(miss));
    assert!(rules.rule(tagger).unwrap().output_array().is_exact());
}
