//! Integration tests for the reminder pipeline.
//!
//! Tests: Repositories → ReminderDispatcher → OutboundChannel → EventStore
//!
//! Verifies:
//! - Reminders go out once, inside the send window, within the lead time
//! - Failed deliveries are retried until the attempt ceiling, then dead-lettered
//! - Overdue sweeps, billing notices and payment confirmations persist their events

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, Utc};

    use payremind_clients::Client;
    use payremind_core::{DomainError, InvoiceId, TransitionError};
    use payremind_invoicing::{Decimal, Invoice, InvoiceStatus};
    use payremind_notifications::{MAX_DELIVERY_ATTEMPTS, NotificationKind, NotificationStatus};
    use payremind_reminders::ReminderConfiguration;

    use crate::channel::RecordingChannel;
    use crate::dispatcher::{DispatchError, ReminderDispatcher, SendOutcome, SkipReason, Stores};
    use crate::event_store::InMemoryEventStore;
    use crate::repository::{
        ClientRepository, ConfigurationRepository, InMemoryClientRepository,
        InMemoryConfigurationRepository, InMemoryInvoiceRepository,
        InMemoryNotificationRepository, InvoiceRepository, NotificationRepository,
    };

    const OWNER: &str = "owner-1";
    const HANDLE: &str = "5511999998888";

    struct Harness {
        clients: Arc<InMemoryClientRepository>,
        configurations: Arc<InMemoryConfigurationRepository>,
        invoices: Arc<InMemoryInvoiceRepository>,
        notifications: Arc<InMemoryNotificationRepository>,
        events: Arc<InMemoryEventStore>,
        channel: Arc<RecordingChannel>,
        dispatcher: ReminderDispatcher<Arc<RecordingChannel>>,
    }

    /// Monday 2024-06-03 09:00 UTC, inside the default 08:00–18:00 window.
    fn t0() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            .and_utc()
    }

    fn setup() -> Harness {
        let clients = Arc::new(InMemoryClientRepository::new());
        let configurations = Arc::new(InMemoryConfigurationRepository::new());
        let invoices = Arc::new(InMemoryInvoiceRepository::new());
        let notifications = Arc::new(InMemoryNotificationRepository::new());
        let events = Arc::new(InMemoryEventStore::new());
        let channel = Arc::new(RecordingChannel::new());

        let stores = Stores {
            clients: clients.clone(),
            configurations: configurations.clone(),
            invoices: invoices.clone(),
            notifications: notifications.clone(),
            events: events.clone(),
        };
        let dispatcher = ReminderDispatcher::new(stores, channel.clone());

        let (configuration, _) = ReminderConfiguration::create(OWNER, t0()).unwrap();
        configurations.save(&configuration).unwrap();

        Harness {
            clients,
            configurations,
            invoices,
            notifications,
            events,
            channel,
            dispatcher,
        }
    }

    fn register_client(h: &Harness) -> Client {
        let (client, _) = Client::register("Maria Silva", HANDLE, None, t0()).unwrap();
        h.clients.save(&client).unwrap();
        client
    }

    fn issue_invoice(h: &Harness, client: &Client, due_in: TimeDelta) -> Invoice {
        let (invoice, _) = Invoice::issue(
            client.id(),
            Decimal::new(15000, 2),
            t0() + due_in,
            "June services",
            t0(),
        )
        .unwrap();
        h.invoices.save(&invoice).unwrap();
        invoice
    }

    fn stored(h: &Harness, id: InvoiceId) -> Invoice {
        h.invoices.find_by_id(id).unwrap().unwrap()
    }

    fn event_types(h: &Harness, aggregate_id: &str) -> Vec<String> {
        h.events
            .events_for(aggregate_id)
            .iter()
            .map(|e| e.event_type().to_string())
            .collect()
    }

    #[test]
    fn run_once_sends_reminder_for_invoice_inside_lead_time() {
        let h = setup();
        let client = register_client(&h);
        let due_soon = issue_invoice(&h, &client, TimeDelta::days(2) + TimeDelta::hours(3));
        let due_later = issue_invoice(&h, &client, TimeDelta::days(10));

        let report = h.dispatcher.run_once(OWNER, &t0()).unwrap();

        assert!(!report.sending_suppressed);
        assert_eq!(report.reminders.len(), 1);
        assert_eq!(report.reminders[0].0, due_soon.id());
        assert_eq!(report.sent(), 1);

        let delivered = h.channel.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].destination, HANDLE);
        assert!(delivered[0].body.contains("Maria Silva"));
        assert!(delivered[0].body.contains(due_soon.number().as_str()));
        assert!(delivered[0].body.contains("150.00"));
        assert!(delivered[0].body.contains("05/06/2024"));

        assert!(stored(&h, due_soon.id()).reminder_sent());
        assert!(!stored(&h, due_later.id()).reminder_sent());
        assert_eq!(
            event_types(&h, &due_soon.id().to_string()),
            vec!["invoicing.invoice.reminder_sent"]
        );

        let sent = h.notifications.find_by_status(NotificationStatus::Sent).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind(), NotificationKind::Reminder);
        assert_eq!(sent[0].attempt_count(), 1);
        assert_eq!(
            event_types(&h, &sent[0].id().to_string()),
            vec!["notifications.notification.queued", "notifications.notification.sent"]
        );
    }

    #[test]
    fn reminder_goes_out_at_most_once() {
        let h = setup();
        let client = register_client(&h);
        issue_invoice(&h, &client, TimeDelta::days(2));

        h.dispatcher.run_once(OWNER, &t0()).unwrap();
        let second = h.dispatcher.run_once(OWNER, &(t0() + TimeDelta::hours(1))).unwrap();

        assert!(second.reminders.is_empty());
        assert_eq!(h.channel.delivered().len(), 1);
    }

    #[test]
    fn nothing_is_sent_outside_the_window_but_overdue_sweep_still_runs() {
        let h = setup();
        let client = register_client(&h);
        issue_invoice(&h, &client, TimeDelta::days(2));
        let soon_overdue = issue_invoice(&h, &client, TimeDelta::hours(1));

        let night = t0() + TimeDelta::hours(12);
        let report = h.dispatcher.run_once(OWNER, &night).unwrap();

        assert!(report.sending_suppressed);
        assert_eq!(report.marked_overdue, vec![soon_overdue.id()]);
        assert!(h.channel.delivered().is_empty());
        assert!(h.dispatcher.due_reminders(OWNER, &night).unwrap().is_empty());
        assert_eq!(stored(&h, soon_overdue.id()).status(), InvoiceStatus::Overdue);
    }

    #[test]
    fn send_window_is_evaluated_in_the_callers_time_zone() {
        let h = setup();
        let client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::days(2));

        let mut configuration = h.configurations.find_by_owner(OWNER).unwrap().unwrap();
        configuration.set_send_window("08:00", "12:00", t0()).unwrap();
        h.configurations.update(&configuration).unwrap();

        // 13:00 UTC is 10:00 at UTC-3.
        let utc = t0() + TimeDelta::hours(4);
        let local = utc.with_timezone(&FixedOffset::west_opt(3 * 3600).unwrap());

        assert!(h.dispatcher.due_reminders(OWNER, &utc).unwrap().is_empty());
        let due = h.dispatcher.due_reminders(OWNER, &local).unwrap();
        assert_eq!(due.iter().map(|i| i.id()).collect::<Vec<_>>(), vec![invoice.id()]);
    }

    #[test]
    fn auto_send_disabled_suppresses_sending() {
        let h = setup();
        let client = register_client(&h);
        issue_invoice(&h, &client, TimeDelta::days(2));

        let mut configuration = h.configurations.find_by_owner(OWNER).unwrap().unwrap();
        configuration.disable_auto_send(t0());
        h.configurations.update(&configuration).unwrap();

        let report = h.dispatcher.run_once(OWNER, &t0()).unwrap();
        assert!(report.sending_suppressed);
        assert!(h.channel.delivered().is_empty());
    }

    #[test]
    fn unknown_owner_gets_nothing() {
        let h = setup();
        let client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::days(2));

        assert!(h.dispatcher.due_reminders("nobody", &t0()).unwrap().is_empty());
        assert!(h.dispatcher.run_once("nobody", &t0()).unwrap().sending_suppressed);
        match h.dispatcher.send_reminder(invoice.id(), "nobody", t0()) {
            Err(DispatchError::ConfigurationNotFound(owner)) => assert_eq!(owner, "nobody"),
            other => panic!("Expected ConfigurationNotFound, got {other:?}"),
        }
    }

    #[test]
    fn inactive_client_is_skipped() {
        let h = setup();
        let mut client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::days(2));
        client.deactivate(t0());
        h.clients.update(&client).unwrap();

        let outcome = h.dispatcher.send_reminder(invoice.id(), OWNER, t0()).unwrap();

        assert_eq!(outcome, SendOutcome::Skipped(SkipReason::ClientInactive));
        assert!(h.channel.delivered().is_empty());
        assert!(!stored(&h, invoice.id()).reminder_sent());
        assert!(h.notifications.find_by_status(NotificationStatus::Pending).unwrap().is_empty());
    }

    #[test]
    fn failed_delivery_leaves_invoice_unreminded_until_retry_succeeds() {
        let h = setup();
        let client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::days(2));
        h.channel.fail_next(1);

        let outcome = h.dispatcher.send_reminder(invoice.id(), OWNER, t0()).unwrap();
        let SendOutcome::Failed { notification_id, reason } = outcome else {
            panic!("Expected Failed outcome");
        };
        assert_eq!(reason, "gateway timeout");
        assert!(!stored(&h, invoice.id()).reminder_sent());

        let failed = h.notifications.find_by_id(notification_id).unwrap().unwrap();
        assert_eq!(failed.status(), NotificationStatus::Failed);
        assert_eq!(failed.last_error(), Some("gateway timeout"));

        let retry = h.dispatcher.retry_failed(t0() + TimeDelta::minutes(5)).unwrap();
        assert_eq!(retry.sent, vec![notification_id]);
        assert!(retry.failed.is_empty());

        let sent = h.notifications.find_by_id(notification_id).unwrap().unwrap();
        assert_eq!(sent.status(), NotificationStatus::Sent);
        assert_eq!(sent.attempt_count(), 2);
        assert!(stored(&h, invoice.id()).reminder_sent());
        assert_eq!(
            event_types(&h, &notification_id.to_string()),
            vec![
                "notifications.notification.queued",
                "notifications.notification.failed",
                "notifications.notification.sent",
            ]
        );
    }

    #[test]
    fn failed_reminder_is_retried_not_requeued() {
        let h = setup();
        let client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::days(2));
        h.channel.fail_next(1);

        let first = h.dispatcher.run_once(OWNER, &t0()).unwrap();
        assert_eq!(first.failed(), 1);

        let second = h.dispatcher.run_once(OWNER, &(t0() + TimeDelta::hours(1))).unwrap();
        assert_eq!(
            second.reminders,
            vec![(invoice.id(), SendOutcome::Skipped(SkipReason::AlreadyQueued))]
        );
        assert!(h.channel.delivered().is_empty());

        let retry = h.dispatcher.retry_failed(t0() + TimeDelta::hours(2)).unwrap();
        assert_eq!(retry.sent.len(), 1);
        h.dispatcher.run_once(OWNER, &(t0() + TimeDelta::hours(3))).unwrap();

        assert_eq!(h.channel.delivered().len(), 1);
        assert_eq!(h.notifications.find_by_invoice(invoice.id()).unwrap().len(), 1);
        assert!(stored(&h, invoice.id()).reminder_sent());
    }

    #[test]
    fn repeated_passes_drive_one_reminder_to_the_dead_letter_ceiling() {
        let h = setup();
        let client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::days(2));
        h.channel.unreachable(HANDLE);

        for minute in 0..10 {
            let now = t0() + TimeDelta::minutes(minute);
            h.dispatcher.run_once(OWNER, &now).unwrap();
            h.dispatcher.retry_failed(now).unwrap();
        }

        let notifications = h.notifications.find_by_invoice(invoice.id()).unwrap();
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].is_dead_lettered());
        assert_eq!(notifications[0].attempt_count(), MAX_DELIVERY_ATTEMPTS);
    }

    #[test]
    fn failed_reminder_is_dropped_once_the_invoice_is_paid() {
        let h = setup();
        let client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::days(2));
        h.channel.fail_next(1);

        let SendOutcome::Failed { notification_id, .. } =
            h.dispatcher.send_reminder(invoice.id(), OWNER, t0()).unwrap()
        else {
            panic!("Expected Failed outcome");
        };
        h.dispatcher.confirm_payment(invoice.id(), OWNER, t0() + TimeDelta::minutes(1)).unwrap();

        let retry = h.dispatcher.retry_failed(t0() + TimeDelta::minutes(5)).unwrap();

        assert_eq!(retry.superseded, vec![notification_id]);
        assert!(retry.sent.is_empty());
        let delivered = h.channel.delivered();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].body.contains("received the payment"));
        assert_eq!(
            h.notifications.find_by_id(notification_id).unwrap().unwrap().attempt_count(),
            1
        );
    }

    #[test]
    fn failed_billing_notice_is_dropped_once_the_invoice_is_cancelled() {
        let h = setup();
        let client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::hours(1));
        h.channel.fail_next(1);

        let next_day = t0() + TimeDelta::days(1);
        let report = h.dispatcher.run_once(OWNER, &next_day).unwrap();
        let (_, SendOutcome::Failed { notification_id, .. }) = report.billing_notices[0].clone()
        else {
            panic!("Expected failed billing notice");
        };

        let mut overdue = stored(&h, invoice.id());
        overdue.cancel(next_day).unwrap();
        h.invoices.update(&overdue).unwrap();

        let retry = h.dispatcher.retry_failed(next_day + TimeDelta::hours(1)).unwrap();
        assert_eq!(retry.superseded, vec![notification_id]);
        assert!(h.channel.delivered().is_empty());
    }

    #[test]
    fn retries_stop_at_the_attempt_ceiling() {
        let h = setup();
        let client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::days(2));
        h.channel.unreachable(HANDLE);

        h.dispatcher.send_reminder(invoice.id(), OWNER, t0()).unwrap();
        for minute in 1..MAX_DELIVERY_ATTEMPTS {
            let retry = h
                .dispatcher
                .retry_failed(t0() + TimeDelta::minutes(i64::from(minute)))
                .unwrap();
            assert_eq!(retry.failed.len(), 1);
        }

        let dead = h.notifications.find_dead_letter_eligible().unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempt_count(), MAX_DELIVERY_ATTEMPTS);
        assert_eq!(dead[0].last_error(), Some("destination 5511999998888 unreachable"));

        h.channel.reachable(HANDLE);
        let retry = h.dispatcher.retry_failed(t0() + TimeDelta::hours(1)).unwrap();
        assert!(retry.sent.is_empty());
        assert_eq!(retry.dead_lettered, vec![dead[0].id()]);
        assert!(h.channel.delivered().is_empty());
        assert!(!stored(&h, invoice.id()).reminder_sent());
    }

    #[test]
    fn newly_overdue_invoices_get_a_billing_notice() {
        let h = setup();
        let client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::hours(1));

        let mut configuration = h.configurations.find_by_owner(OWNER).unwrap().unwrap();
        configuration.set_finance_contact("5511900001111", t0());
        h.configurations.update(&configuration).unwrap();

        let next_day = t0() + TimeDelta::days(1);
        let report = h.dispatcher.run_once(OWNER, &next_day).unwrap();

        assert_eq!(report.marked_overdue, vec![invoice.id()]);
        assert_eq!(report.billing_notices.len(), 1);
        assert!(report.billing_notices[0].1.is_sent());

        let delivered = h.channel.delivered();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].body.contains("5511900001111"));
        assert_eq!(
            event_types(&h, &invoice.id().to_string()),
            vec!["invoicing.invoice.overdue"]
        );

        let again = h.dispatcher.run_once(OWNER, &(next_day + TimeDelta::hours(1))).unwrap();
        assert!(again.marked_overdue.is_empty());
        assert!(again.billing_notices.is_empty());
    }

    #[test]
    fn billing_notice_requires_an_overdue_invoice() {
        let h = setup();
        let client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::days(2));

        let outcome = h.dispatcher.send_billing_notice(invoice.id(), OWNER, t0()).unwrap();
        assert_eq!(outcome, SendOutcome::Skipped(SkipReason::NotEligible));
    }

    #[test]
    fn confirm_payment_marks_paid_and_thanks_the_client() {
        let h = setup();
        let client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::days(2));
        let paid_at = t0() + TimeDelta::hours(2);

        let outcome = h.dispatcher.confirm_payment(invoice.id(), OWNER, paid_at).unwrap();

        assert!(outcome.is_sent());
        let paid = stored(&h, invoice.id());
        assert_eq!(paid.status(), InvoiceStatus::Paid);
        assert_eq!(paid.paid_at(), Some(paid_at));
        assert!(h.channel.delivered()[0].body.contains("received the payment"));
        assert_eq!(event_types(&h, &invoice.id().to_string()), vec!["invoicing.invoice.paid"]);

        // A paid invoice is no longer eligible for reminders.
        assert!(h.dispatcher.due_reminders(OWNER, &paid_at).unwrap().is_empty());

        match h.dispatcher.confirm_payment(invoice.id(), OWNER, paid_at) {
            Err(DispatchError::Domain(DomainError::Transition(TransitionError::AlreadyPaid))) => {}
            other => panic!("Expected AlreadyPaid, got {other:?}"),
        }
        assert_eq!(h.channel.delivered().len(), 1);
    }

    #[test]
    fn confirm_payment_respects_disabled_auto_send() {
        let h = setup();
        let client = register_client(&h);
        let invoice = issue_invoice(&h, &client, TimeDelta::days(2));

        let mut configuration = h.configurations.find_by_owner(OWNER).unwrap().unwrap();
        configuration.disable_auto_send(t0());
        h.configurations.update(&configuration).unwrap();

        let outcome = h.dispatcher.confirm_payment(invoice.id(), OWNER, t0()).unwrap();
        assert_eq!(outcome, SendOutcome::Skipped(SkipReason::AutoSendDisabled));
        assert_eq!(stored(&h, invoice.id()).status(), InvoiceStatus::Paid);
        assert!(h.channel.delivered().is_empty());
    }

    #[test]
    fn missing_invoice_is_an_error() {
        let h = setup();
        let missing = InvoiceId::new();
        match h.dispatcher.send_reminder(missing, OWNER, t0()) {
            Err(DispatchError::InvoiceNotFound(id)) => assert_eq!(id, missing),
            other => panic!("Expected InvoiceNotFound, got {other:?}"),
        }
    }
}
