//! Integration tests for mesh establishment and traffic.
//!
//! Every test builds real meshes over loopback WebSockets. Listeners are
//! bound on OS-assigned ports first so the peer list is known before any
//! mesh starts dialing.

use std::time::Duration;

use meshtris_mesh::{LinkState, Mesh, MeshConfig, MeshEvent};
use meshtris_protocol::{Codec, Hello, JsonCodec, PeerAddress, TetrisMessage};
use meshtris_transport::{Connection, Listener, WebSocketConnection, WebSocketListener};

fn test_config() -> MeshConfig {
    MeshConfig {
        dial_attempts: 20,
        retry_delay: Duration::from_millis(50),
        join_timeout: Duration::from_secs(5),
        ..MeshConfig::default()
    }
}

async fn bind() -> (WebSocketListener, PeerAddress) {
    let listener = WebSocketListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    (listener, PeerAddress::parse(&addr).expect("valid address"))
}

async fn three_meshes() -> (Mesh, Mesh, Mesh) {
    let (la, a) = bind().await;
    let (lb, b) = bind().await;
    let (lc, c) = bind().await;
    let peers = vec![a.clone(), b.clone(), c.clone()];
    tokio::join!(
        Mesh::establish_on(la, test_config(), a, &peers),
        Mesh::establish_on(lb, test_config(), b, &peers),
        Mesh::establish_on(lc, test_config(), c, &peers),
    )
}

async fn next_event(mesh: &mut Mesh) -> MeshEvent {
    tokio::time::timeout(Duration::from_secs(5), mesh.next_inbound())
        .await
        .expect("event should arrive in time")
        .expect("queue should stay open")
}

#[tokio::test]
async fn test_three_peers_form_full_mesh() {
    let (a, b, c) = three_meshes().await;
    for mesh in [&a, &b, &c] {
        let live = mesh.live_peers();
        assert_eq!(live.len(), 2, "{} should see both others", mesh.local());
        assert!(!live.contains(mesh.local()), "self is never linked");
    }
}

#[tokio::test]
async fn test_broadcast_reaches_every_other_peer() {
    let (a, mut b, mut c) = three_meshes().await;

    let sent = a.broadcast(&TetrisMessage::Ready).expect("broadcast");
    assert_eq!(sent, 2);

    for mesh in [&mut b, &mut c] {
        assert_eq!(
            next_event(mesh).await,
            MeshEvent::Message {
                from: a.local().clone(),
                msg: TetrisMessage::Ready,
            }
        );
    }
}

#[tokio::test]
async fn test_messages_from_one_peer_arrive_in_order() {
    let (a, mut b, _c) = three_meshes().await;

    for seed in 0..25 {
        a.broadcast(&TetrisMessage::Start { seed }).expect("broadcast");
    }
    for seed in 0..25 {
        match next_event(&mut b).await {
            MeshEvent::Message { from, msg } => {
                assert_eq!(&from, a.local());
                assert_eq!(msg, TetrisMessage::Start { seed });
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_poll_inbound_never_waits() {
    let (_a, mut b, _c) = three_meshes().await;
    assert!(b.poll_inbound().is_none());
}

#[tokio::test]
async fn test_closed_peer_is_reported_lost_once() {
    let (mut a, mut b, mut c) = three_meshes().await;
    let lost = c.local().clone();

    c.close().await;
    c.close().await;

    for mesh in [&mut a, &mut b] {
        assert_eq!(next_event(mesh).await, MeshEvent::PeerLost(lost.clone()));
        assert_eq!(mesh.link_state(&lost), Some(LinkState::Closed));
        assert_eq!(mesh.live_peers().len(), 1);
    }

    // Broadcasting afterwards skips the closed link and reports nothing new.
    assert_eq!(a.broadcast(&TetrisMessage::Ready).expect("broadcast"), 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(a.poll_inbound().is_none());
}

#[tokio::test]
async fn test_peer_that_never_joins_is_reported_lost() {
    let (listener, local) = bind().await;
    // Bind and drop to get an address nobody listens on.
    let (gone, absent) = bind().await;
    drop(gone);

    let config = MeshConfig {
        dial_attempts: 2,
        retry_delay: Duration::from_millis(10),
        join_timeout: Duration::from_millis(300),
        ..MeshConfig::default()
    };
    let mut mesh =
        Mesh::establish_on(listener, config, local.clone(), &[local, absent.clone()]).await;

    assert!(mesh.live_peers().is_empty());
    assert_eq!(mesh.link_state(&absent), Some(LinkState::Closed));
    assert_eq!(next_event(&mut mesh).await, MeshEvent::PeerLost(absent));
    // No links left: the queue ends.
    assert!(mesh.next_inbound().await.is_none());
}

#[tokio::test]
async fn test_hello_from_unknown_address_is_rejected() {
    let (l1, p1) = bind().await;
    let (l2, p2) = bind().await;
    // The larger address accepts; it is the one a stranger can reach first.
    let ((small_l, small), (large_l, large)) = if p1 < p2 {
        ((l1, p1), (l2, p2))
    } else {
        ((l2, p2), (l1, p1))
    };
    let peers = vec![small.clone(), large.clone()];

    let accepting = tokio::spawn({
        let peers = peers.clone();
        let large = large.clone();
        async move { Mesh::establish_on(large_l, test_config(), large, &peers).await }
    });

    let stranger = WebSocketConnection::connect(large.as_str())
        .await
        .expect("stranger connects");
    let hello = Hello::new(PeerAddress::parse("10.9.9.9:1").unwrap());
    stranger
        .send(&JsonCodec.encode(&hello).unwrap())
        .await
        .expect("send hello");
    let dropped = tokio::time::timeout(Duration::from_secs(5), stranger.recv())
        .await
        .expect("rejection in time");
    assert!(matches!(dropped, Ok(None) | Err(_)), "stranger must be hung up on");

    let dialing = Mesh::establish_on(small_l, test_config(), small.clone(), &peers).await;
    let accepting = accepting.await.expect("task completes");

    assert_eq!(accepting.live_peers(), vec![small]);
    assert_eq!(dialing.live_peers(), vec![large]);
}
