//! End-to-end scenarios against the simulated service
//!
//! Each test owns the process-wide context for its duration, so all of them
//! run serially.

mod common;

use common::{captured_containing, double_variable, doubles, install_capture, start, Seen};
use pvlink::queue::{RequestToken, UpdateEvent};
use pvlink::service::{ServiceCall, SimVariable};
use pvlink::types::{DbrType, FieldType};
use pvlink::ChannelSet;
use serial_test::serial;

#[test]
#[serial]
fn test_float_scalar_first_update() {
    let (mut cx, control) = start();
    control.define(
        "X",
        SimVariable::new(FieldType::Float, 1).with_values(3.25f32.to_ne_bytes().to_vec()),
    );
    let seen = Seen::default();
    let observer = cx.add_observer(seen.clone());
    let x = cx.create_channel("X");
    cx.register(observer, x);

    assert!(cx.open(x));
    control.connect("X");
    cx.poll(100);
    control.complete_gets();
    cx.poll(100);

    let channel = cx.channel(x).unwrap();
    assert!(channel.data_is_available());
    assert_eq!(channel.get_floating(0), 3.25);
    assert_eq!(channel.data_element_count(), 1);
    assert_eq!(seen.take(), vec!["connection:true", "update:true"]);
}

#[test]
#[serial]
fn test_put_ack_inhibits_second_write() {
    install_capture();
    let (mut cx, control) = start();
    control.define("PUT", double_variable(&[0.0]));
    let seen = Seen::default();
    let observer = cx.add_observer(seen.clone());
    let id = cx.create_channel("PUT");
    cx.channel_mut(id).unwrap().set_put_ack(true);
    cx.register(observer, id);
    assert!(cx.open(id));
    control.connect("PUT");
    cx.poll(100);
    control.complete_gets();
    cx.poll(100);
    seen.take();

    assert!(cx.write_integer(id, 5));
    assert!(!cx.write_integer(id, 6));
    assert_eq!(captured_containing("write inhibited"), 1);

    control.ack_writes(true);
    cx.poll(100);
    assert_eq!(seen.take(), vec!["write-ack:true"]);
    assert!(cx.write_integer(id, 7));

    let acked_puts = control
        .calls()
        .iter()
        .filter(|call| matches!(call, ServiceCall::Put { with_ack: true, .. }))
        .count();
    assert_eq!(acked_puts, 2);
}

#[test]
#[serial]
fn test_repeated_connect_up_reports_once() {
    let (mut cx, control) = start();
    control.define("TWICE", double_variable(&[1.0]));
    let seen = Seen::default();
    let observer = cx.add_observer(seen.clone());
    let id = cx.create_channel("TWICE");
    cx.register(observer, id);
    assert!(cx.open(id));
    let handle = cx.channel(id).unwrap().handle().unwrap();

    control.connect("TWICE");
    cx.poll(100);
    assert!(control.inject_connection(handle, true));
    cx.poll(100);

    assert_eq!(seen.count("connection:true"), 1);
    // The second connect replaced the first subscription.
    assert_eq!(control.subscription_count(), 1);
    let clears = control
        .calls()
        .iter()
        .filter(|call| matches!(call, ServiceCall::ClearSubscription(_)))
        .count();
    assert_eq!(clears, 1);
}

#[test]
#[serial]
fn test_disconnect_and_reconnect() {
    let (mut cx, control) = start();
    control.define("FLAP", double_variable(&[1.0]));
    let seen = Seen::default();
    let observer = cx.add_observer(seen.clone());
    let id = cx.create_channel("FLAP");
    cx.register(observer, id);
    assert!(cx.open(id));
    control.connect("FLAP");
    cx.poll(100);
    control.complete_gets();
    cx.poll(100);

    control.disconnect("FLAP");
    cx.poll(100);
    let channel = cx.channel(id).unwrap();
    assert!(!channel.is_connected());
    assert!(!channel.data_is_available());
    assert!(channel.disconnect_time().is_some());
    assert_eq!(channel.get_floating(0), 0.0);
    assert_eq!(control.subscription_count(), 0);

    control.connect("FLAP");
    cx.poll(100);
    control.complete_gets();
    cx.poll(100);
    assert_eq!(cx.channel(id).unwrap().get_floating(0), 1.0);
    assert_eq!(
        seen.take(),
        vec![
            "connection:true",
            "update:true",
            "connection:false",
            "connection:true",
            "update:true",
        ]
    );
}

#[test]
#[serial]
fn test_registration_symmetry_on_destroy() {
    let (mut cx, _control) = start();
    let seen = Seen::default();
    let observer = cx.add_observer(seen.clone());
    let a = cx.create_channel("SYM:A");
    let b = cx.create_channel("SYM:B");
    cx.register(observer, a);
    cx.register(observer, b);

    cx.destroy_channel(a);
    assert_eq!(cx.observer_channels(observer), vec![b]);

    cx.remove_observer(observer);
    assert!(!cx.channel(b).unwrap().is_observed_by(observer));
    assert_eq!(cx.channel(b).unwrap().observer_count(), 0);
}

#[test]
#[serial]
fn test_queued_event_for_closed_channel_never_reaches_successor() {
    let (mut cx, control) = start();
    control.set_recycle_handles(true);
    control.define("OLD", double_variable(&[1.0]));
    control.define("NEW", double_variable(&[2.0]));

    let old = cx.create_channel("OLD");
    assert!(cx.open(old));
    control.connect("OLD");
    cx.poll(100);
    let handle = cx.channel(old).unwrap().handle().unwrap();
    control.complete_gets();
    // The completion is queued, not yet drained, when the channel closes.
    cx.close(old);
    cx.destroy_channel(old);

    let new = cx.create_channel("NEW");
    assert!(cx.open(new));
    assert_eq!(cx.channel(new).unwrap().handle(), Some(handle));
    cx.poll(100);
    control.connect("NEW");
    cx.poll(100);
    assert!(!cx.channel(new).unwrap().data_is_available());

    control.complete_gets();
    cx.poll(100);
    assert_eq!(cx.channel(new).unwrap().get_floating(0), 2.0);
}

#[test]
#[serial]
fn test_payload_alternates_between_inline_and_heap() {
    let (mut cx, control) = start();
    let wide: Vec<f64> = (0..10).map(f64::from).collect();
    control.define("WAVE", double_variable(&wide));
    let id = cx.create_channel("WAVE");
    assert!(cx.open(id));
    control.connect("WAVE");
    cx.poll(100);
    control.complete_gets();
    cx.poll(100);
    assert!(!cx.channel(id).unwrap().payload().is_inline());

    for round in 0..6 {
        let values = if round % 2 == 0 {
            vec![round as f64]
        } else {
            wide.iter().map(|v| v + round as f64).collect()
        };
        control.post_value("WAVE", doubles(&values));
        cx.poll(100);

        let channel = cx.channel(id).unwrap();
        assert_eq!(channel.payload().is_inline(), values.len() == 1);
        assert_eq!(channel.data_element_count(), values.len());
        assert_eq!(channel.raw_data(0), doubles(&values).as_slice());
        assert_eq!(channel.get_floating_array(), values);
    }
}

#[test]
#[serial]
fn test_invalid_and_empty_updates_are_ignored() {
    let (mut cx, control) = start();
    control.define("ODD", double_variable(&[4.0]));
    let seen = Seen::default();
    let observer = cx.add_observer(seen.clone());
    let id = cx.create_channel("ODD");
    cx.register(observer, id);
    assert!(cx.open(id));
    control.connect("ODD");
    cx.poll(100);
    control.complete_gets();
    cx.poll(100);
    seen.take();

    let handle = cx.channel(id).unwrap().handle().unwrap();
    let tag = control.tag_of(handle);
    // Token 1 is the channel's read token on this fresh context.
    control.inject_update(
        UpdateEvent::new(handle, tag, 999, 1, RequestToken(1)).with_values(doubles(&[9.0])),
    );
    control.inject_update(UpdateEvent::new(
        handle,
        tag,
        DbrType::update_for(FieldType::Double).raw(),
        0,
        RequestToken(1),
    ));
    control.inject_update(UpdateEvent::new(
        handle,
        tag,
        DbrType::update_for(FieldType::Double).raw(),
        1,
        RequestToken(1),
    ));
    assert_eq!(cx.poll(100), Some(3));
    assert!(cx.channel(id).unwrap().data_is_available());
    assert_eq!(cx.channel(id).unwrap().get_floating(0), 4.0);
    assert!(seen.take().is_empty());
}

#[test]
#[serial]
fn test_owning_set_lifecycle() {
    let (mut cx, control) = start();
    let mut set = ChannelSet::owning();
    for name in ["GRP:A", "GRP:B", "GRP:C"] {
        control.define(name, double_variable(&[1.0]));
        set.insert(cx.create_channel(name));
    }
    assert!(set.open_all(&mut cx));
    for name in ["GRP:A", "GRP:B", "GRP:C"] {
        control.connect(name);
    }
    cx.poll(100);
    control.complete_gets();
    assert!(set.wait_all_ready(
        &mut cx,
        std::time::Duration::from_secs(2),
        std::time::Duration::from_millis(1),
    ));

    set.release(&mut cx);
    assert_eq!(cx.channel_count(), 0);
    assert_eq!(control.channel_count(), 0);
}
