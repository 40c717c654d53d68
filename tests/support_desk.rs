use console_core::capabilities::{ChannelEvent, ChannelOperation, HttpResponse, StoreOutput};
use console_core::conversation::{DeliveryState, MessageAuthor, MessageEvent};
use console_core::directory::{CouponRecord, DirectoryCommand, DirectorySection, LoadStatus};
use console_core::session::{OperatorProfile, SessionSnapshot};
use console_core::{
    App, AppState, CouponId, CruxApp, Effect, Event, MessageId, Model, OperatorId, SupportTicket,
    TicketId, TicketKind, TicketPriority, TripId, ViewState,
};
use crux_core::testing::AppTester;

fn operator() -> OperatorProfile {
    OperatorProfile {
        id: OperatorId::new("op-7"),
        name: "Dana Ferreira".into(),
        email: "dana@example.com".into(),
    }
}

fn ticket(id: &str, kind: TicketKind) -> SupportTicket {
    SupportTicket {
        id: TicketId::new(id),
        kind,
        trip_id: Some(TripId::new(format!("trip-{id}"))),
        reporter_name: "Ana Lima".into(),
        summary: format!("issue on {id}"),
        priority: TicketPriority::High,
        is_sos: false,
        opened_at_ms: 1_000,
    }
}

fn reporter_message(ticket_id: &str, seq: u64, body: &str) -> MessageEvent {
    MessageEvent {
        id: MessageId::new(format!("srv-{seq}")),
        ticket_id: TicketId::new(ticket_id),
        author: MessageAuthor::Reporter,
        body: body.into(),
        sent_at_ms: 1_000 + seq,
        seq,
        client_ref: None,
    }
}

fn json_response<T: serde::Serialize>(status: u16, body: &T) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![],
        body: serde_json::to_vec(body).unwrap(),
    }
}

/// Boots into Ready with a connected channel.
fn boot_connected(app: &AppTester<App, Effect>, model: &mut Model) {
    app.update(
        Event::Started {
            api_base: "https://api.example.com".into(),
            events_url: "wss://events.example.com/live".into(),
        },
        model,
    );
    let bytes = SessionSnapshot {
        api_base: "https://api.example.com".into(),
        events_url: "wss://events.example.com/live".into(),
        token: "tok-123".into(),
        operator: operator(),
    }
    .encode()
    .unwrap();
    app.update(
        Event::SessionRestored(Box::new(Ok(StoreOutput::Value { value: Some(bytes) }))),
        model,
    );
    assert_eq!(model.state, AppState::Ready);
    let epoch = model.channel.epoch();
    app.update(
        Event::ChannelDelivery {
            epoch,
            result: Box::new(Ok(ChannelEvent::Opened)),
        },
        model,
    );
    assert!(model.channel.phase().is_connected());
}

fn push_ticket(app: &AppTester<App, Effect>, model: &mut Model, ticket: SupportTicket) {
    let epoch = model.channel.epoch();
    app.update(
        Event::ChannelDelivery {
            epoch,
            result: Box::new(Ok(ChannelEvent::TicketOpened { ticket })),
        },
        model,
    );
}

fn push_message(app: &AppTester<App, Effect>, model: &mut Model, message: MessageEvent) {
    let epoch = model.channel.epoch();
    app.update(
        Event::ChannelDelivery {
            epoch,
            result: Box::new(Ok(ChannelEvent::MessageReceived { message })),
        },
        model,
    );
}

fn select_ticket(app: &AppTester<App, Effect>, model: &mut Model, kind: TicketKind, id: &str) {
    app.update(
        Event::TicketSelected {
            kind,
            ticket_id: TicketId::new(id),
        },
        model,
    );
    let fetch_id = model.selection.as_ref().unwrap().fetch_id;
    app.update(
        Event::HistoryResponse {
            fetch_id,
            result: Box::new(Ok(json_response(200, &Vec::<MessageEvent>::new()))),
        },
        model,
    );
}

fn pending_message_id(model: &Model) -> MessageId {
    model
        .selection
        .as_ref()
        .unwrap()
        .buffer
        .messages()
        .iter()
        .find(|m| m.delivery == DeliveryState::Sending)
        .map(|m| m.id.clone())
        .expect("expected a pending local send")
}

#[test]
fn pushed_tickets_insert_at_head_once() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);

    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    push_ticket(&app, &mut model, ticket("T2", TicketKind::Customer));
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));

    let ids: Vec<&str> = model
        .customer_tickets
        .tickets()
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(ids, vec!["T2", "T1"]);
}

#[test]
fn pushes_route_to_the_queue_of_their_kind() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);

    push_ticket(&app, &mut model, ticket("C1", TicketKind::Customer));
    push_ticket(&app, &mut model, ticket("D1", TicketKind::Driver));

    assert_eq!(model.customer_tickets.len(), 1);
    assert_eq!(model.driver_tickets.len(), 1);
}

#[test]
fn sos_push_lands_at_the_head_with_a_badge() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);

    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    let mut sos = ticket("T2", TicketKind::Customer);
    sos.priority = TicketPriority::Critical;
    sos.is_sos = true;
    push_ticket(&app, &mut model, sos);

    let view = App::default().view(&model);
    let ViewState::Ready {
        customer_tickets, ..
    } = view.state
    else {
        panic!("expected the ready view");
    };
    assert_eq!(customer_tickets[0].id, "T2");
    assert!(customer_tickets[0].is_sos);
    assert_eq!(customer_tickets[0].badge.as_deref(), Some("SOS"));
}

#[test]
fn stale_epoch_push_is_dropped() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);

    let stale = model.channel.epoch() - 1;
    app.update(
        Event::ChannelDelivery {
            epoch: stale,
            result: Box::new(Ok(ChannelEvent::TicketOpened {
                ticket: ticket("T1", TicketKind::Customer),
            })),
        },
        &mut model,
    );
    assert!(model.customer_tickets.is_empty());
}

#[test]
fn ticket_list_response_replaces_queue() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("old", TicketKind::Customer));

    let fetched = vec![
        ticket("T1", TicketKind::Customer),
        ticket("T2", TicketKind::Customer),
    ];
    app.update(
        Event::TicketsResponse {
            kind: TicketKind::Customer,
            result: Box::new(Ok(json_response(200, &fetched))),
        },
        &mut model,
    );

    let ids: Vec<&str> = model
        .customer_tickets
        .tickets()
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(ids, vec!["T1", "T2"]);
}

#[test]
fn selecting_a_ticket_joins_room_and_fetches_history() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));

    let update = app.update(
        Event::TicketSelected {
            kind: TicketKind::Customer,
            ticket_id: TicketId::new("T1"),
        },
        &mut model,
    );

    let selection = model.selection.as_ref().expect("selection should exist");
    assert!(selection.history_loading);

    let joins = update.effects.iter().any(|e| {
        matches!(
            e,
            Effect::Channel(req) if matches!(req.operation, ChannelOperation::Join { .. })
        )
    });
    assert!(joins, "selection should join the conversation room");

    let history_url = update.effects.iter().find_map(|e| {
        if let Effect::Http(req) = e {
            Some(req.operation.url.clone())
        } else {
            None
        }
    });
    assert_eq!(
        history_url.as_deref(),
        Some("https://api.example.com/api/v1/support/customer/tickets/T1/messages")
    );
}

#[test]
fn selecting_an_unknown_ticket_is_ignored() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);

    app.update(
        Event::TicketSelected {
            kind: TicketKind::Customer,
            ticket_id: TicketId::new("ghost"),
        },
        &mut model,
    );
    assert!(model.selection.is_none());
}

#[test]
fn history_seeds_the_buffer_in_sequence_order() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    app.update(
        Event::TicketSelected {
            kind: TicketKind::Customer,
            ticket_id: TicketId::new("T1"),
        },
        &mut model,
    );

    let history = vec![
        reporter_message("T1", 3, "third"),
        reporter_message("T1", 1, "first"),
        reporter_message("T1", 2, "second"),
    ];
    let fetch_id = model.selection.as_ref().unwrap().fetch_id;
    app.update(
        Event::HistoryResponse {
            fetch_id,
            result: Box::new(Ok(json_response(200, &history))),
        },
        &mut model,
    );

    let selection = model.selection.as_ref().unwrap();
    assert!(!selection.history_loading);
    let bodies: Vec<&str> = selection
        .buffer
        .messages()
        .iter()
        .map(|m| m.body.as_str())
        .collect();
    assert_eq!(bodies, vec!["first", "second", "third"]);
}

#[test]
fn stale_history_response_is_ignored() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    push_ticket(&app, &mut model, ticket("T2", TicketKind::Customer));

    app.update(
        Event::TicketSelected {
            kind: TicketKind::Customer,
            ticket_id: TicketId::new("T1"),
        },
        &mut model,
    );
    let first_fetch = model.selection.as_ref().unwrap().fetch_id;

    // Reselect before the first history lands.
    app.update(
        Event::TicketSelected {
            kind: TicketKind::Customer,
            ticket_id: TicketId::new("T2"),
        },
        &mut model,
    );

    app.update(
        Event::HistoryResponse {
            fetch_id: first_fetch,
            result: Box::new(Ok(json_response(
                200,
                &vec![reporter_message("T1", 1, "from the old ticket")],
            ))),
        },
        &mut model,
    );

    let selection = model.selection.as_ref().unwrap();
    assert_eq!(selection.ticket_id.as_str(), "T2");
    assert!(selection.buffer.is_empty());
    assert!(selection.history_loading);
}

#[test]
fn live_messages_land_only_in_the_selected_conversation() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    select_ticket(&app, &mut model, TicketKind::Customer, "T1");

    push_message(&app, &mut model, reporter_message("T1", 1, "hello"));
    push_message(&app, &mut model, reporter_message("T9", 2, "elsewhere"));

    let selection = model.selection.as_ref().unwrap();
    assert_eq!(selection.buffer.len(), 1);
    assert_eq!(selection.buffer.messages()[0].body, "hello");
}

#[test]
fn duplicate_live_message_is_dropped() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    select_ticket(&app, &mut model, TicketKind::Customer, "T1");

    push_message(&app, &mut model, reporter_message("T1", 1, "hello"));
    push_message(&app, &mut model, reporter_message("T1", 1, "hello"));

    assert_eq!(model.selection.as_ref().unwrap().buffer.len(), 1);
}

#[test]
fn out_of_order_arrivals_sort_by_sequence() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    select_ticket(&app, &mut model, TicketKind::Customer, "T1");

    push_message(&app, &mut model, reporter_message("T1", 4, "fourth"));
    push_message(&app, &mut model, reporter_message("T1", 2, "second"));
    push_message(&app, &mut model, reporter_message("T1", 3, "third"));

    let bodies: Vec<&str> = model
        .selection
        .as_ref()
        .unwrap()
        .buffer
        .messages()
        .iter()
        .map(|m| m.body.as_str())
        .collect();
    assert_eq!(bodies, vec!["second", "third", "fourth"]);
}

#[test]
fn send_appends_optimistically_with_idempotency_key() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    select_ticket(&app, &mut model, TicketKind::Customer, "T1");

    app.update(
        Event::MessageDraftChanged {
            text: "  on my way  ".into(),
        },
        &mut model,
    );
    let update = app.update(Event::SendMessageRequested, &mut model);

    let selection = model.selection.as_ref().unwrap();
    assert!(selection.draft.is_empty(), "draft should clear on send");
    assert_eq!(selection.buffer.len(), 1);
    let local = &selection.buffer.messages()[0];
    assert_eq!(local.body, "on my way");
    assert_eq!(local.delivery, DeliveryState::Sending);
    assert!(local.seq.is_none());
    assert!(local.author.is_operator());

    let request = update
        .effects
        .iter()
        .find_map(|e| {
            if let Effect::Http(req) = e {
                Some(&req.operation)
            } else {
                None
            }
        })
        .expect("send should issue a request");
    assert_eq!(
        request.header("idempotency-key"),
        Some(local.id.as_str()),
        "client id doubles as the idempotency key"
    );
}

#[test]
fn empty_draft_is_rejected_without_a_request() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    select_ticket(&app, &mut model, TicketKind::Customer, "T1");

    app.update(Event::MessageDraftChanged { text: "   ".into() }, &mut model);
    let update = app.update(Event::SendMessageRequested, &mut model);

    assert!(model.selection.as_ref().unwrap().buffer.is_empty());
    assert!(model.active_error.is_some());
    let sends = update
        .effects
        .iter()
        .any(|e| matches!(e, Effect::Http(_)));
    assert!(!sends);
}

#[test]
fn send_response_confirms_the_local_message() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    select_ticket(&app, &mut model, TicketKind::Customer, "T1");

    app.update(Event::MessageDraftChanged { text: "hi".into() }, &mut model);
    app.update(Event::SendMessageRequested, &mut model);
    let client_ref = pending_message_id(&model);

    let body = serde_json::json!({ "id": "srv-9", "seq": 9, "sentAtMs": 5_000 });
    app.update(
        Event::MessageSendResponse {
            client_ref: client_ref.clone(),
            result: Box::new(Ok(json_response(201, &body))),
        },
        &mut model,
    );

    let message = &model.selection.as_ref().unwrap().buffer.messages()[0];
    assert_eq!(message.id, client_ref);
    assert_eq!(message.delivery, DeliveryState::Sent);
    assert_eq!(message.seq, Some(9));
    assert_eq!(message.sent_at_ms, 5_000);
}

#[test]
fn failed_send_is_marked_failed_and_kept() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    select_ticket(&app, &mut model, TicketKind::Customer, "T1");

    app.update(Event::MessageDraftChanged { text: "hi".into() }, &mut model);
    app.update(Event::SendMessageRequested, &mut model);
    let client_ref = pending_message_id(&model);

    app.update(
        Event::MessageSendResponse {
            client_ref,
            result: Box::new(Ok(HttpResponse {
                status: 500,
                headers: vec![],
                body: vec![],
            })),
        },
        &mut model,
    );

    let message = &model.selection.as_ref().unwrap().buffer.messages()[0];
    assert_eq!(message.delivery, DeliveryState::Failed);
    assert!(model.active_error.is_some());
}

#[test]
fn channel_echo_merges_into_the_local_send() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    select_ticket(&app, &mut model, TicketKind::Customer, "T1");

    app.update(Event::MessageDraftChanged { text: "hi".into() }, &mut model);
    app.update(Event::SendMessageRequested, &mut model);
    let client_ref = pending_message_id(&model);

    let echo = MessageEvent {
        id: MessageId::new("srv-9"),
        ticket_id: TicketId::new("T1"),
        author: MessageAuthor::Operator {
            id: OperatorId::new("op-7"),
        },
        body: "hi".into(),
        sent_at_ms: 5_000,
        seq: 9,
        client_ref: Some(client_ref),
    };
    push_message(&app, &mut model, echo);

    let buffer = &model.selection.as_ref().unwrap().buffer;
    assert_eq!(buffer.len(), 1, "echo must not duplicate the local send");
    let message = &buffer.messages()[0];
    assert_eq!(message.delivery, DeliveryState::Sent);
    assert_eq!(message.seq, Some(9));
}

#[test]
fn local_sends_sort_after_sequenced_messages() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    select_ticket(&app, &mut model, TicketKind::Customer, "T1");

    app.update(Event::MessageDraftChanged { text: "mine".into() }, &mut model);
    app.update(Event::SendMessageRequested, &mut model);
    push_message(&app, &mut model, reporter_message("T1", 1, "theirs"));

    let bodies: Vec<&str> = model
        .selection
        .as_ref()
        .unwrap()
        .buffer
        .messages()
        .iter()
        .map(|m| m.body.as_str())
        .collect();
    assert_eq!(bodies, vec!["theirs", "mine"]);
}

#[test]
fn tab_switch_drops_the_selection() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    select_ticket(&app, &mut model, TicketKind::Customer, "T1");

    app.update(
        Event::TabSelected {
            kind: TicketKind::Driver,
        },
        &mut model,
    );

    assert_eq!(model.active_tab, TicketKind::Driver);
    assert!(model.selection.is_none());
}

#[test]
fn resolve_requires_notes() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    select_ticket(&app, &mut model, TicketKind::Customer, "T1");

    let update = app.update(Event::ResolveRequested, &mut model);

    assert!(model.active_error.is_some());
    assert!(model.selection.is_some());
    let sends = update
        .effects
        .iter()
        .any(|e| matches!(e, Effect::Http(_)));
    assert!(!sends);
}

#[test]
fn resolve_success_removes_ticket_and_selection() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);
    push_ticket(&app, &mut model, ticket("T1", TicketKind::Customer));
    select_ticket(&app, &mut model, TicketKind::Customer, "T1");

    app.update(
        Event::ResolveNotesChanged {
            text: "caller confirmed pickup".into(),
        },
        &mut model,
    );
    let update = app.update(Event::ResolveRequested, &mut model);
    let resolve_url = update.effects.iter().find_map(|e| {
        if let Effect::Http(req) = e {
            Some(req.operation.url.clone())
        } else {
            None
        }
    });
    assert_eq!(
        resolve_url.as_deref(),
        Some("https://api.example.com/api/v1/support/customer/tickets/T1/resolve")
    );

    app.update(
        Event::ResolveResponse {
            kind: TicketKind::Customer,
            ticket_id: TicketId::new("T1"),
            result: Box::new(Ok(HttpResponse {
                status: 200,
                headers: vec![],
                body: vec![],
            })),
        },
        &mut model,
    );

    assert!(model.customer_tickets.is_empty());
    assert!(model.selection.is_none());
    assert!(model.active_toast.is_some());
}

#[test]
fn section_select_loads_once_and_refresh_reloads() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);

    let update = app.update(
        Event::SectionSelected {
            section: DirectorySection::Coupons,
        },
        &mut model,
    );
    let coupon_url = update.effects.iter().find_map(|e| {
        if let Effect::Http(req) = e {
            Some(req.operation.url.clone())
        } else {
            None
        }
    });
    assert_eq!(
        coupon_url.as_deref(),
        Some("https://api.example.com/api/v1/coupons")
    );
    assert!(model.directory.status(DirectorySection::Coupons).is_loading());

    let coupons = vec![CouponRecord {
        id: CouponId::new("CP1"),
        code: "WELCOME10".into(),
        discount_percent: 10,
        active: true,
        expires_at_ms: None,
    }];
    app.update(
        Event::SectionResponse {
            section: DirectorySection::Coupons,
            epoch: model.directory.epoch(DirectorySection::Coupons),
            result: Box::new(Ok(json_response(200, &coupons))),
        },
        &mut model,
    );
    assert_eq!(
        *model.directory.status(DirectorySection::Coupons),
        LoadStatus::Loaded
    );
    assert_eq!(model.directory.rows(DirectorySection::Coupons).len(), 1);

    // Selecting an already loaded section does not refetch.
    let update = app.update(
        Event::SectionSelected {
            section: DirectorySection::Coupons,
        },
        &mut model,
    );
    let refetches = update
        .effects
        .iter()
        .any(|e| matches!(e, Effect::Http(_)));
    assert!(!refetches);

    // An explicit refresh does.
    let update = app.update(
        Event::SectionRefreshRequested {
            section: DirectorySection::Coupons,
        },
        &mut model,
    );
    let refetches = update
        .effects
        .iter()
        .any(|e| matches!(e, Effect::Http(_)));
    assert!(refetches);
}

#[test]
fn stale_section_response_is_dropped() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);

    app.update(
        Event::SectionSelected {
            section: DirectorySection::Coupons,
        },
        &mut model,
    );
    let stale = model.directory.epoch(DirectorySection::Coupons);
    app.update(
        Event::SectionRefreshRequested {
            section: DirectorySection::Coupons,
        },
        &mut model,
    );

    app.update(
        Event::SectionResponse {
            section: DirectorySection::Coupons,
            epoch: stale,
            result: Box::new(Ok(json_response(200, &Vec::<CouponRecord>::new()))),
        },
        &mut model,
    );
    assert!(model.directory.status(DirectorySection::Coupons).is_loading());
}

#[test]
fn command_success_reloads_its_section() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);

    let command = DirectoryCommand::DeactivateCoupon {
        id: CouponId::new("CP1"),
    };
    let update = app.update(Event::CommandRequested(command.clone()), &mut model);
    let command_url = update.effects.iter().find_map(|e| {
        if let Effect::Http(req) = e {
            Some(req.operation.url.clone())
        } else {
            None
        }
    });
    assert_eq!(
        command_url.as_deref(),
        Some("https://api.example.com/api/v1/coupons/CP1/deactivate")
    );

    let update = app.update(
        Event::CommandResponse {
            command,
            result: Box::new(Ok(HttpResponse {
                status: 200,
                headers: vec![],
                body: vec![],
            })),
        },
        &mut model,
    );

    assert!(model.active_toast.is_some());
    let reloads = update.effects.iter().any(|e| {
        matches!(
            e,
            Effect::Http(req) if req.operation.url.ends_with("/api/v1/coupons")
        )
    });
    assert!(reloads, "command success should reload the section");
}

#[test]
fn command_with_missing_reason_is_rejected_locally() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();
    boot_connected(&app, &mut model);

    let command = DirectoryCommand::SuspendDriver {
        id: console_core::DriverId::new("D1"),
        reason: "  ".into(),
    };
    let update = app.update(Event::CommandRequested(command), &mut model);

    assert!(model.active_error.is_some());
    let sends = update
        .effects
        .iter()
        .any(|e| matches!(e, Effect::Http(_)));
    assert!(!sends);
}
