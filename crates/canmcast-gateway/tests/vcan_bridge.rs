//! End-to-end bridge test over a virtual CAN interface.
//!
//! Requires a vcan interface, e.g.:
//!
//! ```text
//! ip link add dev vcan0 type vcan
//! ip link set up vcan0
//! CANMCAST_TEST_CAN_IFACE=vcan0 cargo test -p canmcast-gateway
//! ```
//!
//! Skipped when `CANMCAST_TEST_CAN_IFACE` is unset so plain CI runs stay
//! green without network privileges.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::time::Duration;

use canmcast_frame::{encode_frame, CanFrame, FRAME_SIZE};
use canmcast_gateway::{GatewayConfig, Supervisor};
use canmcast_transport::{join_blocking, BusEndpoint, McastRoute};

const GROUP: Ipv4Addr = Ipv4Addr::new(239, 77, 0, 1);
const GROUP_PORT: u16 = 47832;
const INJECT_PORT: u16 = 47831;

#[test]
fn bridges_both_directions_over_vcan() {
    let Ok(interface) = std::env::var("CANMCAST_TEST_CAN_IFACE") else {
        return;
    };

    // A second bus socket observes what the gateway writes and injects
    // what the gateway should forward.
    let observer = BusEndpoint::open(&interface).expect("observer open");

    // Join the group the gateway mirrors bus traffic to, before the
    // gateway starts sending.
    let receive_route = McastRoute::new(
        IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        GROUP_PORT,
        IpAddr::V4(GROUP),
        GROUP_PORT,
    )
    .expect("receive route");
    let receiver =
        join_blocking(&receive_route, Duration::from_secs(5)).expect("join group");

    let gateway_route = McastRoute::new(
        IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        INJECT_PORT,
        IpAddr::V4(GROUP),
        GROUP_PORT,
    )
    .expect("gateway route");
    let config = GatewayConfig::new(interface, vec![gateway_route])
        .expect("config")
        .with_poll_timeout(Duration::from_millis(100));

    let supervisor = Supervisor::new(config);
    let mut bridge = supervisor.connect().expect("connect");
    std::thread::spawn(move || {
        let _ = bridge.run();
    });

    // Bus -> net: a frame sent on the bus arrives as one multicast
    // datagram holding exactly its wire encoding.
    let outbound = CanFrame::new(0x123, &[1, 2, 3]).unwrap();
    let outbound_wire = encode_frame(&outbound);
    assert!(observer.try_send(&outbound_wire).expect("bus send"));

    let mut buf = [0u8; 64];
    let (len, _) = receiver.recv_from(&mut buf).expect("multicast datagram");
    assert_eq!(len, FRAME_SIZE);
    assert_eq!(&buf[..FRAME_SIZE], &outbound_wire);

    // Net -> bus: junk datagrams are dropped, a valid injection reaches
    // the bus intact and in order.
    let injector = UdpSocket::bind("0.0.0.0:0").expect("injector bind");
    let gateway_addr = (Ipv4Addr::LOCALHOST, INJECT_PORT);
    injector
        .send_to(b"not-a-frame", gateway_addr)
        .expect("junk send");

    let mut bad_dlc = encode_frame(&CanFrame::new(0x7ff, &[0xaa]).unwrap());
    bad_dlc[4] = 9;
    injector.send_to(&bad_dlc, gateway_addr).expect("bad dlc send");

    let inbound = CanFrame::new(0x456, &[9, 8, 7, 6]).unwrap();
    let inbound_wire = encode_frame(&inbound);
    injector.send_to(&inbound_wire, gateway_addr).expect("inject");

    let mut received = None;
    for _ in 0..500 {
        if let Some(wire) = observer.try_recv().expect("bus recv") {
            received = Some(wire);
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(received, Some(inbound_wire));
}
