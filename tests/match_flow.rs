//! End-to-end match flow over real websockets

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use celestial_server::app::AppState;
use celestial_server::client::{ClientEvent, ClientState, MatchClient, PassDisplay, WsTransport};
use celestial_server::config::{Config, MatchSettings};
use celestial_server::game::{PerSeat, Seat};
use celestial_server::http::build_router;

const DECK_A: &str = "a0™a1™a2™a3™a4™a5™a6™a7™a8™a9";
const DECK_B: &str = "b0™b1™b2™b3™b4™b5™b6™b7™b8™b9";

async fn spawn_server(settings: MatchSettings) -> SocketAddr {
    let mut config = Config::from_lookup(|_| None).unwrap();
    config.match_settings = settings;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(AppState::new(config));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, deck: &str) -> (MatchClient, mpsc::Receiver<ClientEvent>) {
    let transport = WsTransport::connect(&format!("ws://{addr}/ws")).await.unwrap();
    MatchClient::start(transport, deck)
}

async fn next(events: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Skip ahead to the first state push matching `pred`
async fn state_where(
    events: &mut mpsc::Receiver<ClientEvent>,
    pred: impl Fn(&ClientState) -> bool,
) -> ClientState {
    loop {
        match next(events).await {
            ClientEvent::State(state) if pred(&state) => return state,
            ClientEvent::Disconnected { reason } => panic!("disconnected early: {reason:?}"),
            _ => {}
        }
    }
}

struct Pair {
    a: MatchClient,
    a_events: mpsc::Receiver<ClientEvent>,
    b: MatchClient,
    b_events: mpsc::Receiver<ClientEvent>,
}

/// Two clients through the handshake, first states consumed
async fn paired(addr: SocketAddr) -> (Pair, ClientState, ClientState) {
    let (a, mut a_events) = connect(addr, DECK_A).await;
    assert_eq!(next(&mut a_events).await, ClientEvent::Connected);
    assert_eq!(next(&mut a_events).await, ClientEvent::WaitingForOpponent);

    let (b, mut b_events) = connect(addr, DECK_B).await;
    assert_eq!(next(&mut b_events).await, ClientEvent::Connected);
    assert_eq!(next(&mut b_events).await, ClientEvent::BothPlayersConnected);
    assert_eq!(next(&mut a_events).await, ClientEvent::BothPlayersConnected);

    let first_a = state_where(&mut a_events, |_| true).await;
    let first_b = state_where(&mut b_events, |_| true).await;

    (
        Pair {
            a,
            a_events,
            b,
            b_events,
        },
        first_a,
        first_b,
    )
}

#[tokio::test]
async fn both_clients_see_themselves_as_seat_zero() {
    let addr = spawn_server(MatchSettings::default()).await;
    let (mut pair, first_a, first_b) = paired(addr).await;

    assert_eq!(first_a.passes(), 0);
    assert_eq!(first_a.winner(), None);
    assert_eq!(first_a.priority(), first_b.priority().other());
    assert_eq!(first_a.my_hand().len(), 3);
    assert_eq!(first_b.my_hand().len(), 3);
    assert!(first_a.my_hand().iter().all(|c| c.as_str().starts_with('a')));
    assert!(first_b.my_hand().iter().all(|c| c.as_str().starts_with('b')));
    assert_eq!(PassDisplay::derive(&first_a), PassDisplay::Hidden);

    pair.a.mulligan(vec![false; 3]).unwrap();
    pair.b.mulligan(vec![false; 3]).unwrap();
    let a = state_where(&mut pair.a_events, ClientState::all_mulligans_complete).await;
    let b = state_where(&mut pair.b_events, ClientState::all_mulligans_complete).await;

    // exactly one side may act, and each knows which without knowing its seat
    let a_turn = PassDisplay::derive(&a).act_enabled();
    let b_turn = PassDisplay::derive(&b).act_enabled();
    assert_ne!(a_turn, b_turn);
    assert_eq!(a_turn, a.priority() == Seat::Zero);
    assert_eq!(b_turn, b.priority() == Seat::Zero);
}

#[tokio::test]
async fn two_passes_resolve_the_round_for_both() {
    let addr = spawn_server(MatchSettings::default()).await;
    let (mut pair, _, _) = paired(addr).await;

    pair.a.mulligan(vec![false; 3]).unwrap();
    pair.b.mulligan(vec![false; 3]).unwrap();
    let a = state_where(&mut pair.a_events, ClientState::all_mulligans_complete).await;
    let b = state_where(&mut pair.b_events, ClientState::all_mulligans_complete).await;

    let version = a.version_no();
    assert_eq!(version, b.version_no());
    let Pair {
        a: client_a,
        a_events,
        b: client_b,
        b_events,
    } = &mut pair;
    let (first, second, second_events) = if a.priority() == Seat::Zero {
        (client_a, client_b, b_events)
    } else {
        (client_b, client_a, a_events)
    };

    first.pass_turn(version).unwrap();
    let after_pass = state_where(second_events, |s| s.passes() == 1).await;
    assert_eq!(after_pass.priority(), Seat::Zero);
    second.pass_turn(after_pass.version_no()).unwrap();

    for events in [&mut pair.a_events, &mut pair.b_events] {
        let recap = loop {
            match next(events).await {
                ClientEvent::RoundRecap(recap) => break recap,
                ClientEvent::Disconnected { reason } => panic!("disconnected early: {reason:?}"),
                _ => {}
            }
        };
        assert!(recap.story.is_empty());
        assert_eq!(recap.wins, PerSeat::new(0, 0));

        let live = state_where(events, |_| true).await;
        assert_eq!(live.passes(), 0);
        assert_eq!(live.raw().round_count, 1);
        assert!(!live.is_recap());
        assert_eq!(live.my_hand().len(), 5);
    }
}

#[tokio::test]
async fn emotes_cross_to_the_opponent() {
    let addr = spawn_server(MatchSettings::default()).await;
    let (mut pair, _, _) = paired(addr).await;

    pair.a.emote(4).unwrap();
    loop {
        match next(&mut pair.b_events).await {
            ClientEvent::OpponentEmote(emote) => {
                assert_eq!(emote, 4);
                break;
            }
            ClientEvent::Disconnected { reason } => panic!("disconnected early: {reason:?}"),
            _ => {}
        }
    }
}

#[tokio::test]
async fn leaving_hands_the_match_to_the_opponent() {
    let addr = spawn_server(MatchSettings::default()).await;
    let (mut pair, _, _) = paired(addr).await;

    pair.b.exit().unwrap();

    let last = state_where(&mut pair.a_events, |s| s.winner().is_some()).await;
    assert_eq!(last.winner(), Some(Seat::Zero));
    assert!(PassDisplay::derive(&last).act_enabled());

    let mut results = 0;
    let mut opponent_left = false;
    loop {
        match next(&mut pair.a_events).await {
            ClientEvent::Results { winner } => {
                assert_eq!(winner, Seat::Zero);
                results += 1;
            }
            ClientEvent::OpponentDisconnected => opponent_left = true,
            ClientEvent::Disconnected { .. } => break,
            _ => {}
        }
    }
    assert_eq!(results, 1);
    assert!(opponent_left);

    match next(&mut pair.b_events).await {
        ClientEvent::Disconnected { reason } => assert_eq!(reason.as_deref(), Some("left match")),
        other => panic!("expected Disconnected, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_message_types_do_not_break_the_session() {
    let addr = spawn_server(MatchSettings::default()).await;
    let (mut raw, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    let waiting = raw.next().await.unwrap().unwrap();
    assert_eq!(
        waiting,
        Message::Text(r#"{"type":"both_players_connected","value":false}"#.to_string())
    );
    raw.send(Message::Text(r#"{"type":"spectate","value":"wave"}"#.to_string()))
        .await
        .unwrap();

    let (_b, mut b_events) = connect(addr, DECK_B).await;
    assert_eq!(next(&mut b_events).await, ClientEvent::Connected);
    assert_eq!(next(&mut b_events).await, ClientEvent::BothPlayersConnected);

    let paired = raw.next().await.unwrap().unwrap();
    assert_eq!(
        paired,
        Message::Text(r#"{"type":"both_players_connected","value":true}"#.to_string())
    );
}

#[tokio::test]
async fn a_lone_player_is_timed_out() {
    let addr = spawn_server(MatchSettings {
        peer_wait_timeout: Duration::from_millis(100),
        ..MatchSettings::default()
    })
    .await;
    let (_a, mut a_events) = connect(addr, DECK_A).await;

    assert_eq!(next(&mut a_events).await, ClientEvent::Connected);
    assert_eq!(next(&mut a_events).await, ClientEvent::WaitingForOpponent);
    match next(&mut a_events).await {
        ClientEvent::ServerError { code, .. } => assert_eq!(code, "peer_timeout"),
        other => panic!("expected ServerError, got {other:?}"),
    }
    assert!(matches!(next(&mut a_events).await, ClientEvent::Disconnected { .. }));
}
