//!
//! URL reservation operations on top of a [`ConfigStore`].
//!
//! Every public method opens one API session for its whole duration. The
//! session is closed on every exit path, including errors.

use crate::config::ClientConfig;
use crate::error::{Operation, Result, UrlAclError};
use crate::reservation::{validate_url_prefix, UrlReservation};
use crate::rule::{AccessRule, RuleSet};
use crate::session::Session;
use crate::store::{same_url, ConfigStore, QueryNext, UrlAclRecord};
use crate::win32::Win32Error;

/// Registers, enumerates, updates and deletes URL reservations.
#[derive(Debug, Clone)]
pub struct UrlAclClient<S: ConfigStore> {
    store: S,
    config: ClientConfig,
}

impl<S: ConfigStore> UrlAclClient<S> {
    pub fn new(store: S) -> Self {
        UrlAclClient { store, config: ClientConfig::default() }
    }

    pub fn with_config(store: S, config: ClientConfig) -> Self {
        UrlAclClient { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn session(&self) -> Result<Session<'_, S>> {
        Ok(Session::open(&self.store, self.config.api_version)?)
    }

    /// Registers a new reservation for `url` granting `rule`.
    pub fn register(&self, url: &str, rule: AccessRule) -> Result<UrlReservation> {
        validate_url_prefix(url)?;
        let rules: RuleSet = std::iter::once(rule).collect();
        let record = UrlAclRecord::new(url, rules.to_sddl());

        let _session = self.session()?;
        tracing::debug!(url, sddl = %record.sddl, "setting URL reservation");
        match self.store.set(&record) {
            Ok(()) => {}
            Err(code) if code == Win32Error::ERROR_ALREADY_EXISTS => {
                return Err(UrlAclError::AlreadyExists { url: url.to_string(), code });
            }
            Err(code) => return Err(UrlAclError::Native { code }),
        }
        tracing::info!(url, "registered URL reservation");
        Ok(UrlReservation::new(url, rules))
    }

    /// Lists every reservation in the store.
    ///
    /// Records are read one at a time with an increasing token. When the
    /// store reports the buffer is too small, the buffer grows to the size
    /// it asked for and the same token is queried once more.
    pub fn reservations(&self) -> Result<Vec<UrlReservation>> {
        let _session = self.session()?;
        let mut reservations = Vec::new();
        let mut buffer_len = self.config.initial_buffer_len;
        let mut token = 0u32;

        loop {
            let mut answer = self.store.query_next(token, buffer_len)?;
            if let QueryNext::InsufficientBuffer { required } = answer {
                if required > self.config.max_buffer_len {
                    return Err(UrlAclError::BufferLimit {
                        required,
                        limit: self.config.max_buffer_len,
                    });
                }
                tracing::debug!(token, from = buffer_len, to = required, "growing query buffer");
                buffer_len = buffer_len.max(required);
                answer = self.store.query_next(token, buffer_len)?;
            }

            let record = match answer {
                QueryNext::Record(record) => record,
                QueryNext::NoMoreItems => break,
                QueryNext::InsufficientBuffer { required } => {
                    tracing::warn!(token, buffer_len, required, "store still reports a short buffer");
                    return Err(UrlAclError::Native { code: Win32Error::ERROR_INSUFFICIENT_BUFFER });
                }
            };
            reservations.push(self.to_reservation(record)?);
            token += 1;
        }

        tracing::debug!(count = reservations.len(), "enumerated URL reservations");
        Ok(reservations)
    }

    /// Looks up the reservation for `url`, compared without regard to case.
    pub fn reservation(&self, url: &str) -> Result<Option<UrlReservation>> {
        Ok(self.reservations()?.into_iter().find(|r| same_url(r.url(), url)))
    }

    /// Grants `rule` on the reservation and writes the new ACL to the store.
    ///
    /// `reservation` is only changed when the store accepted the update.
    pub fn add_access_rule(&self, reservation: &mut UrlReservation, rule: AccessRule) -> Result<()> {
        let mut rules = reservation.rules().clone();
        rules.add(rule);
        self.update(reservation.url(), &rules)?;
        reservation.set_rules(rules);
        Ok(())
    }

    /// Revokes the rights of `rule` and writes the new ACL to the store.
    ///
    /// The store is updated even when nothing matched. Returns whether the
    /// rule matched an entry.
    pub fn remove_access_rule(&self, reservation: &mut UrlReservation, rule: &AccessRule) -> Result<bool> {
        let mut rules = reservation.rules().clone();
        let removed = rules.remove(rule);
        self.update(reservation.url(), &rules)?;
        reservation.set_rules(rules);
        Ok(removed)
    }

    /// Deletes the reservation from the store.
    pub fn delete(&self, reservation: &UrlReservation) -> Result<()> {
        self.delete_url(reservation.url())
    }

    /// Deletes the reservation for `url` from the store.
    pub fn delete_url(&self, url: &str) -> Result<()> {
        let _session = self.session()?;
        tracing::debug!(url, "deleting URL reservation");
        self.store
            .delete(url)
            .map_err(|code| not_found_or_native(url, Operation::Delete, code))?;
        tracing::info!(url, "deleted URL reservation");
        Ok(())
    }

    /// Replaces the stored ACL of `url`: delete the record, then set it again.
    fn update(&self, url: &str, rules: &RuleSet) -> Result<()> {
        let record = UrlAclRecord::new(url, rules.to_sddl());
        let _session = self.session()?;
        tracing::debug!(url, sddl = %record.sddl, "updating URL reservation");
        self.store
            .delete(url)
            .map_err(|code| not_found_or_native(url, Operation::Update, code))?;
        self.store.set(&record).map_err(|code| {
            tracing::warn!(url, %code, "URL reservation was removed but could not be written back");
            UrlAclError::Native { code }
        })?;
        tracing::info!(url, rules = rules.len(), "updated URL reservation");
        Ok(())
    }

    fn to_reservation(&self, record: UrlAclRecord) -> Result<UrlReservation> {
        let mut rules = RuleSet::from_sddl(&record.sddl).map_err(|e| {
            tracing::warn!(url = %record.url, sddl = %record.sddl, error = %e, "unreadable URL reservation");
            e
        })?;
        if self.config.resolve_accounts {
            for rule in rules.iter_mut() {
                rule.identity.account = self.store.account_name(&rule.identity.sid);
            }
        }
        Ok(UrlReservation::new(record.url, rules))
    }
}

fn not_found_or_native(url: &str, operation: Operation, code: Win32Error) -> UrlAclError {
    if code == Win32Error::ERROR_FILE_NOT_FOUND {
        UrlAclError::NotFound { url: url.to_string(), operation, code }
    } else {
        UrlAclError::Native { code }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiVersion;
    use crate::rights::AccessRights;
    use crate::sid::Sid;
    use crate::store::scripted::{Call, ScriptedStore};
    use crate::store::MemoryStore;

    fn sid(s: &str) -> Sid {
        s.parse().unwrap()
    }

    fn client() -> UrlAclClient<ScriptedStore> {
        UrlAclClient::new(ScriptedStore::default())
    }

    #[test]
    fn test_register_writes_single_ace() {
        let client = client();
        let reservation = client
            .register("http://+:8080/app/", AccessRule::new(sid("NS"), AccessRights::Listen))
            .unwrap();
        assert_eq!(reservation.url(), "http://+:8080/app/");
        assert_eq!(reservation.rules().len(), 1);
        assert_eq!(
            client.store().calls(),
            vec![
                Call::Initialize(ApiVersion::V1),
                Call::Set(UrlAclRecord::new("http://+:8080/app/", "D:(A;;GX;;;NS)")),
                Call::Terminate,
            ]
        );
    }

    #[test]
    fn test_register_invalid_url_never_reaches_store() {
        let client = client();
        let err = client
            .register("http://+:8080", AccessRule::new(sid("WD"), AccessRights::Listen))
            .unwrap_err();
        assert!(matches!(err, UrlAclError::InvalidUrl { .. }));
        assert!(client.store().calls().is_empty());
    }

    #[test]
    fn test_register_maps_failures() {
        let client = client();
        let rule = AccessRule::new(sid("WD"), AccessRights::Listen);
        client.register("http://+:80/", rule.clone()).unwrap();

        let err = client.register("http://+:80/", rule.clone()).unwrap_err();
        assert_eq!(
            err,
            UrlAclError::AlreadyExists {
                url: "http://+:80/".into(),
                code: Win32Error::ERROR_ALREADY_EXISTS
            }
        );

        client.store().fail_set(Win32Error::ERROR_ACCESS_DENIED);
        let err = client.register("http://+:81/", rule).unwrap_err();
        assert_eq!(err, UrlAclError::Native { code: Win32Error::ERROR_ACCESS_DENIED });
        assert_eq!(client.store().inner.open_sessions(), 0);
    }

    #[test]
    fn test_enumeration_grows_buffer_then_keeps_it() {
        let store = ScriptedStore::new(MemoryStore::with_records(vec![
            UrlAclRecord::new("http://+:80/a/", "D:(A;;GX;;;WD)"),
            UrlAclRecord::new("http://+:80/b/", "D:(A;;GX;;;BU)"),
        ]));
        let first = UrlAclRecord::new("http://+:80/a/", "D:(A;;GX;;;WD)").native_size();
        let client = UrlAclClient::new(store);

        let list = client.reservations().unwrap();
        assert_eq!(list.iter().map(|r| r.url()).collect::<Vec<_>>(), vec!["http://+:80/a/", "http://+:80/b/"]);

        let queries: Vec<Call> = client
            .store()
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::QueryNext { .. }))
            .collect();
        assert_eq!(
            queries,
            vec![
                Call::QueryNext { token: 0, buffer_len: 0 },
                Call::QueryNext { token: 0, buffer_len: first },
                Call::QueryNext { token: 1, buffer_len: first },
                Call::QueryNext { token: 2, buffer_len: first },
            ]
        );
    }

    #[test]
    fn test_enumeration_fails_when_retry_is_short_again() {
        let client = client();
        client.store().answer_query(Ok(QueryNext::InsufficientBuffer { required: 64 }));
        client.store().answer_query(Ok(QueryNext::InsufficientBuffer { required: 128 }));
        let err = client.reservations().unwrap_err();
        assert_eq!(err, UrlAclError::Native { code: Win32Error::ERROR_INSUFFICIENT_BUFFER });
        assert_eq!(client.store().inner.open_sessions(), 0);
    }

    #[test]
    fn test_enumeration_stops_when_retry_reports_no_more_items() {
        let client = client();
        client.store().answer_query(Ok(QueryNext::InsufficientBuffer { required: 64 }));
        client.store().answer_query(Ok(QueryNext::NoMoreItems));
        assert!(client.reservations().unwrap().is_empty());
        assert_eq!(
            client
                .store()
                .calls()
                .into_iter()
                .filter(|c| matches!(c, Call::QueryNext { .. }))
                .collect::<Vec<_>>(),
            vec![
                Call::QueryNext { token: 0, buffer_len: 0 },
                Call::QueryNext { token: 0, buffer_len: 64 },
            ]
        );
        assert_eq!(client.store().inner.open_sessions(), 0);
    }

    #[test]
    fn test_enumeration_respects_buffer_limit() {
        let config = ClientConfig { max_buffer_len: 32, ..Default::default() };
        let client = UrlAclClient::with_config(ScriptedStore::default(), config);
        client.store().answer_query(Ok(QueryNext::InsufficientBuffer { required: 33 }));
        assert_eq!(
            client.reservations().unwrap_err(),
            UrlAclError::BufferLimit { required: 33, limit: 32 }
        );
    }

    #[test]
    fn test_enumeration_propagates_native_error() {
        let client = client();
        client.store().answer_query(Err(Win32Error::ERROR_ACCESS_DENIED));
        assert_eq!(
            client.reservations().unwrap_err().code(),
            Some(Win32Error::ERROR_ACCESS_DENIED)
        );
        assert_eq!(client.store().inner.open_sessions(), 0);
    }

    #[test]
    fn test_enumeration_resolves_accounts() {
        let store = ScriptedStore::new(MemoryStore::with_records(vec![UrlAclRecord::new(
            "http://+:80/",
            "D:(A;;GX;;;NS)",
        )]));
        store.name_account(sid("NS"), "NT AUTHORITY\\NETWORK SERVICE");
        let client = UrlAclClient::new(store);
        let list = client.reservations().unwrap();
        let rule = list[0].access_rules().next().unwrap();
        assert_eq!(rule.identity.account.as_deref(), Some("NT AUTHORITY\\NETWORK SERVICE"));

        let config = ClientConfig { resolve_accounts: false, ..Default::default() };
        let client = UrlAclClient::with_config(client.store, config);
        let list = client.reservations().unwrap();
        assert_eq!(list[0].access_rules().next().unwrap().identity.account, None);
    }

    #[test]
    fn test_add_rule_deletes_then_sets() {
        let client = client();
        let mut reservation = client
            .register("http://+:80/", AccessRule::new(sid("NS"), AccessRights::Listen))
            .unwrap();
        client.store().clear_calls();

        client
            .add_access_rule(&mut reservation, AccessRule::new(sid("BU"), AccessRights::Delegate))
            .unwrap();
        assert_eq!(reservation.rules().rights_of(&sid("BU")), Some(AccessRights::Delegate));
        assert_eq!(
            client.store().calls(),
            vec![
                Call::Initialize(ApiVersion::V1),
                Call::Delete("http://+:80/".into()),
                Call::Set(UrlAclRecord::new("http://+:80/", "D:(A;;GX;;;NS)(A;;GW;;;BU)")),
                Call::Terminate,
            ]
        );
    }

    #[test]
    fn test_added_rule_is_listed_in_canonical_order() {
        let client = client();
        let user = sid("S-1-5-21-100-200-300-1001");
        let mut reservation = client
            .register("http://+:80/", AccessRule::new(user.clone(), AccessRights::ListenAndDelegate))
            .unwrap();
        client
            .add_access_rule(&mut reservation, AccessRule::new(Sid::everyone(), AccessRights::Delegate))
            .unwrap();

        assert_eq!(
            client.store().inner.records(),
            vec![UrlAclRecord::new(
                "http://+:80/",
                "D:(A;;GW;;;WD)(A;;GXGW;;;S-1-5-21-100-200-300-1001)"
            )]
        );
        let stored = client.reservation("http://+:80/").unwrap().unwrap();
        let rules: Vec<(Sid, AccessRights)> =
            stored.access_rules().map(|r| (r.sid().clone(), r.rights)).collect();
        assert_eq!(
            rules,
            vec![(Sid::everyone(), AccessRights::Delegate), (user, AccessRights::ListenAndDelegate)]
        );
    }

    #[test]
    fn test_remove_rule_updates_even_without_match() {
        let client = client();
        let mut reservation = client
            .register("http://+:80/", AccessRule::new(sid("NS"), AccessRights::Listen))
            .unwrap();
        client.store().clear_calls();

        let removed = client
            .remove_access_rule(&mut reservation, &AccessRule::new(sid("WD"), AccessRights::Listen))
            .unwrap();
        assert!(!removed);
        assert_eq!(client.store().calls().len(), 4);

        let removed = client
            .remove_access_rule(&mut reservation, &AccessRule::new(sid("NS"), AccessRights::Listen))
            .unwrap();
        assert!(removed);
        assert!(reservation.rules().is_empty());
        assert_eq!(client.store().inner.records(), vec![UrlAclRecord::new("http://+:80/", "D:")]);
    }

    #[test]
    fn test_update_of_vanished_reservation() {
        let client = client();
        let mut reservation = client
            .register("http://+:80/", AccessRule::new(sid("NS"), AccessRights::Listen))
            .unwrap();
        client.delete_url("http://+:80/").unwrap();

        let before = reservation.clone();
        let err = client
            .add_access_rule(&mut reservation, AccessRule::new(sid("WD"), AccessRights::Listen))
            .unwrap_err();
        assert!(matches!(err, UrlAclError::NotFound { operation: Operation::Update, .. }));
        assert_eq!(reservation, before);

        let err = client
            .remove_access_rule(&mut reservation, &AccessRule::new(sid("NS"), AccessRights::Listen))
            .unwrap_err();
        assert_eq!(
            err,
            UrlAclError::NotFound {
                url: "http://+:80/".into(),
                operation: Operation::Update,
                code: Win32Error::ERROR_FILE_NOT_FOUND
            }
        );
        assert_eq!(reservation, before);
        assert!(client.store().inner.records().is_empty());
    }

    #[test]
    fn test_update_delete_failure_is_native_and_skips_set() {
        let client = client();
        let mut reservation = client
            .register("http://+:80/", AccessRule::new(sid("NS"), AccessRights::Listen))
            .unwrap();
        client.store().clear_calls();
        client.store().fail_delete(Win32Error::ERROR_ACCESS_DENIED);

        let err = client
            .add_access_rule(&mut reservation, AccessRule::new(sid("BU"), AccessRights::Listen))
            .unwrap_err();
        assert_eq!(err, UrlAclError::Native { code: Win32Error::ERROR_ACCESS_DENIED });
        assert_eq!(
            client.store().calls(),
            vec![
                Call::Initialize(ApiVersion::V1),
                Call::Delete("http://+:80/".into()),
                Call::Terminate,
            ]
        );
        assert_eq!(reservation.rules().len(), 1);
        assert_eq!(client.store().inner.records(), vec![UrlAclRecord::new("http://+:80/", "D:(A;;GX;;;NS)")]);
    }

    #[test]
    fn test_update_set_failure_is_native() {
        let client = client();
        let mut reservation = client
            .register("http://+:80/", AccessRule::new(sid("NS"), AccessRights::Listen))
            .unwrap();
        client.store().fail_set(Win32Error::ERROR_INVALID_PARAMETER);
        let err = client
            .add_access_rule(&mut reservation, AccessRule::new(sid("WD"), AccessRights::Listen))
            .unwrap_err();
        assert_eq!(err, UrlAclError::Native { code: Win32Error::ERROR_INVALID_PARAMETER });
        assert_eq!(reservation.rules().len(), 1);
    }

    #[test]
    fn test_delete() {
        let client = client();
        let reservation = client
            .register("http://+:80/", AccessRule::new(sid("NS"), AccessRights::Listen))
            .unwrap();
        client.delete(&reservation).unwrap();
        assert!(client.reservations().unwrap().is_empty());

        let err = client.delete(&reservation).unwrap_err();
        assert!(matches!(err, UrlAclError::NotFound { operation: Operation::Delete, .. }));

        client.store().fail_delete(Win32Error::ERROR_ACCESS_DENIED);
        let err = client.delete(&reservation).unwrap_err();
        assert_eq!(err, UrlAclError::Native { code: Win32Error::ERROR_ACCESS_DENIED });
    }

    #[test]
    fn test_initialize_failure_is_native() {
        let client = client();
        client.store().fail_initialize(Win32Error::ERROR_ACCESS_DENIED);
        let err = client.reservations().unwrap_err();
        assert_eq!(err, UrlAclError::Native { code: Win32Error::ERROR_ACCESS_DENIED });
        assert_eq!(client.store().inner.open_sessions(), 0);
    }

    #[test]
    fn test_unreadable_record_fails_enumeration() {
        let store = ScriptedStore::new(MemoryStore::with_records(vec![UrlAclRecord::new(
            "http://+:80/",
            "D:(D;;GX;;;WD)",
        )]));
        let client = UrlAclClient::new(store);
        assert!(matches!(client.reservations(), Err(UrlAclError::Sddl(_))));
    }

    #[test]
    fn test_nonstandard_mask_does_not_hide_other_records() {
        let store = ScriptedStore::new(MemoryStore::with_records(vec![
            UrlAclRecord::new("http://+:80/good/", "D:(A;;GX;;;WD)"),
            UrlAclRecord::new("http://+:80/admin/", "D:(A;;GA;;;BA)"),
        ]));
        let client = UrlAclClient::new(store);

        let good = client.reservation("http://+:80/good/").unwrap().unwrap();
        assert_eq!(good.rules().rights_of(&Sid::everyone()), Some(AccessRights::Listen));

        let mut admin = client.reservation("http://+:80/admin/").unwrap().unwrap();
        assert_eq!(admin.rules().rights_of(&sid("BA")), Some(AccessRights::Other(0x1000_0000)));

        client
            .add_access_rule(&mut admin, AccessRule::new(sid("NS"), AccessRights::Listen))
            .unwrap();
        assert_eq!(
            client.store().inner.records()[1],
            UrlAclRecord::new("http://+:80/admin/", "D:(A;;GX;;;NS)(A;;0x10000000;;;BA)")
        );
    }
}
