//! Wait cycles are broken by aborting the youngest participant.

use baton_tests::prelude::*;

mod two_party {
    use super::*;

    #[test]
    fn test_younger_requester_is_aborted() {
        // GIVEN - A (older) holds X and waits on Y, B (younger) holds Y
        init_tracing();
        let m = Arc::new(bank(2, 0, LogicalClock::new()));
        let (x, y) = (rid(0), rid(1));
        let a = Caller::spawn("a");
        let b = Caller::spawn("b");
        a.on(&m, move |m| -> TransactionResult<()> {
            m.start_transaction()?;
            m.operate_on_resource(x, Tag::new("a"))
        })
        .wait()
        .unwrap();
        b.on(&m, move |m| -> TransactionResult<()> {
            m.start_transaction()?;
            m.operate_on_resource(y, Tag::new("b"))
        })
        .wait()
        .unwrap();
        let mut a_on_y = a.on(&m, move |m| m.operate_on_resource(y, Tag::new("a")));
        wait_until("a waits on y", || m.waiting_count(y) == 1);

        // WHEN - B closes the cycle
        let b_on_x = b
            .on(&m, move |m| m.operate_on_resource(x, Tag::new("b")))
            .wait();

        // THEN - B is the victim, A proceeds once B rolls back
        assert!(matches!(
            b_on_x,
            Err(TransactionError::Aborted { caller }) if caller == b.id()
        ));
        assert!(b.on(&m, |m| m.is_transaction_aborted()).wait());
        // A's thread is parked on Y, so only look at it from outside.
        assert!(a_on_y.is_pending());
        assert_eq!(m.waiting_count(y), 1);
        assert_eq!(m.waiting_count(x), 0);

        b.on(&m, |m| m.rollback_current_transaction()).wait();
        a_on_y.wait().unwrap();
        assert!(!a.on(&m, |m| m.is_transaction_aborted()).wait());
        a.on(&m, |m| m.commit_current_transaction()).wait().unwrap();

        assert_eq!(m.with_resource(x, |l| l.tags.clone()).unwrap(), vec!["a"]);
        assert_eq!(m.with_resource(y, |l| l.tags.clone()).unwrap(), vec!["a"]);
        assert_eq!(m.stats().deadlocks_resolved, 1);
        assert_eq!(m.active_transactions(), 0);
    }

    #[test]
    fn test_younger_waiter_is_aborted() {
        // GIVEN - A (older) holds X, B (younger) holds Y and waits on X
        let m = Arc::new(bank(2, 0, LogicalClock::new()));
        let (x, y) = (rid(0), rid(1));
        let a = Caller::spawn("a");
        let b = Caller::spawn("b");
        a.on(&m, move |m| -> TransactionResult<()> {
            m.start_transaction()?;
            m.operate_on_resource(x, Deposit(1))
        })
        .wait()
        .unwrap();
        b.on(&m, move |m| -> TransactionResult<()> {
            m.start_transaction()?;
            m.operate_on_resource(y, Deposit(2))
        })
        .wait()
        .unwrap();
        let b_on_x = b.on(&m, move |m| m.operate_on_resource(x, Deposit(2)));
        wait_until("b waits on x", || m.waiting_count(x) == 1);

        // WHEN - A closes the cycle
        let a_on_y = a.on(&m, move |m| m.operate_on_resource(y, Deposit(1)));

        // THEN - the waiting B is woken with an abort and A waits for Y
        let b_result = b_on_x.wait();
        assert!(matches!(
            b_result,
            Err(TransactionError::Aborted { caller }) if caller == b.id()
        ));
        assert_eq!(m.waiting_count(x), 0);
        wait_until("a waits on y", || m.waiting_count(y) == 1);

        b.on(&m, |m| m.rollback_current_transaction()).wait();
        a_on_y.wait().unwrap();
        a.on(&m, |m| m.commit_current_transaction()).wait().unwrap();

        assert_eq!(m.with_resource(x, |l| l.balance).unwrap(), 1);
        assert_eq!(m.with_resource(y, |l| l.balance).unwrap(), 1);
    }

    #[test]
    fn test_aborted_caller_is_refused_until_rollback() {
        // GIVEN - B has been aborted as in the first scenario
        let m = Arc::new(bank(2, 0, LogicalClock::new()));
        let (x, y) = (rid(0), rid(1));
        let a = Caller::spawn("a");
        let b = Caller::spawn("b");
        a.on(&m, move |m| -> TransactionResult<()> {
            m.start_transaction()?;
            m.operate_on_resource(x, Deposit(1))
        })
        .wait()
        .unwrap();
        b.on(&m, move |m| -> TransactionResult<()> {
            m.start_transaction()?;
            m.operate_on_resource(y, Deposit(1))
        })
        .wait()
        .unwrap();
        let a_on_y = a.on(&m, move |m| m.operate_on_resource(y, Deposit(1)));
        wait_until("a waits on y", || m.waiting_count(y) == 1);
        let _ = b.on(&m, move |m| m.operate_on_resource(x, Deposit(1))).wait();

        // WHEN / THEN
        let again = b.on(&m, move |m| m.operate_on_resource(y, Deposit(1))).wait();
        assert!(matches!(again, Err(TransactionError::Aborted { .. })));
        let commit = b.on(&m, |m| m.commit_current_transaction()).wait();
        assert!(matches!(commit, Err(TransactionError::Aborted { .. })));
        assert!(b.on(&m, |m| m.is_transaction_active()).wait());

        b.on(&m, |m| m.rollback_current_transaction()).wait();
        assert!(!b.on(&m, |m| m.is_transaction_aborted()).wait());
        a_on_y.wait().unwrap();
        a.on(&m, |m| m.commit_current_transaction()).wait().unwrap();
    }
}

mod tie_break {
    use super::*;

    fn run_cycle(a: &Caller, b: &Caller) -> (TransactionResult<()>, TransactionResult<()>) {
        // Both transactions start at the same logical time.
        let m = Arc::new(bank(2, 0, || 7u64));
        let (x, y) = (rid(0), rid(1));
        a.on(&m, move |m| -> TransactionResult<()> {
            m.start_transaction()?;
            m.operate_on_resource(x, Tag::new("a"))
        })
        .wait()
        .unwrap();
        b.on(&m, move |m| -> TransactionResult<()> {
            m.start_transaction()?;
            m.operate_on_resource(y, Tag::new("b"))
        })
        .wait()
        .unwrap();
        let a_on_y = a.on(&m, move |m| m.operate_on_resource(y, Tag::new("a")));
        wait_until("a waits on y", || m.waiting_count(y) == 1);
        let b_on_x = b.on(&m, move |m| m.operate_on_resource(x, Tag::new("b")));

        // The loser fails first and rolls back; only then can the survivor
        // finish. A wrong choice of victim leaves both steps stuck.
        let (a_result, b_result) = if b.id() > a.id() {
            let b_result = b_on_x.wait();
            b.on(&m, |m| m.rollback_current_transaction()).wait();
            let a_result = a_on_y.wait();
            a.on(&m, |m| m.commit_current_transaction()).wait().unwrap();
            (a_result, b_result)
        } else {
            let a_result = a_on_y.wait();
            a.on(&m, |m| m.rollback_current_transaction()).wait();
            let b_result = b_on_x.wait();
            b.on(&m, |m| m.commit_current_transaction()).wait().unwrap();
            (a_result, b_result)
        };
        assert_eq!(m.stats().deadlocks_resolved, 1);
        (a_result, b_result)
    }

    #[test]
    fn test_larger_ordinal_loses_as_requester() {
        // GIVEN - B is spawned later, so it has the larger ordinal
        let a = Caller::spawn("a");
        let b = Caller::spawn("b");
        assert!(b.id() > a.id());

        // WHEN
        let (a_result, b_result) = run_cycle(&a, &b);

        // THEN
        assert!(a_result.is_ok());
        assert!(matches!(b_result, Err(TransactionError::Aborted { .. })));
    }

    #[test]
    fn test_larger_ordinal_loses_as_waiter() {
        // GIVEN - A is spawned later, so the waiting A has the larger ordinal
        let b = Caller::spawn("b");
        let a = Caller::spawn("a");
        assert!(a.id() > b.id());

        // WHEN
        let (a_result, b_result) = run_cycle(&a, &b);

        // THEN
        assert!(matches!(a_result, Err(TransactionError::Aborted { .. })));
        assert!(b_result.is_ok());
    }

    #[test]
    fn test_outcome_is_reproducible() {
        for _ in 0..5 {
            let a = Caller::spawn("a");
            let b = Caller::spawn("b");
            let (a_result, b_result) = run_cycle(&a, &b);
            assert!(a_result.is_ok());
            assert!(b_result.is_err());
        }
    }
}

mod three_party {
    use super::*;

    #[test]
    fn test_youngest_in_the_middle_is_aborted() {
        // GIVEN - start order A, C, B; A holds X, B holds Y, C holds Z
        let m = Arc::new(bank(3, 0, LogicalClock::new()));
        let (x, y, z) = (rid(0), rid(1), rid(2));
        let a = Caller::spawn("a");
        let b = Caller::spawn("b");
        let c = Caller::spawn("c");
        for (caller, resource) in [(&a, x), (&c, z), (&b, y)] {
            let label = caller.name().to_string();
            caller
                .on(&m, move |m| -> TransactionResult<()> {
                    m.start_transaction()?;
                    m.operate_on_resource(resource, Tag(label))
                })
                .wait()
                .unwrap();
        }

        // A waits on Y, B waits on Z
        let a_on_y = a.on(&m, move |m| m.operate_on_resource(y, Tag::new("a")));
        wait_until("a waits on y", || m.waiting_count(y) == 1);
        let b_on_z = b.on(&m, move |m| m.operate_on_resource(z, Tag::new("b")));
        wait_until("b waits on z", || m.waiting_count(z) == 1);

        // WHEN - C asks for X and closes A -> B -> C -> A
        let c_on_x = c.on(&m, move |m| m.operate_on_resource(x, Tag::new("c")));

        // THEN - B, the latest starter, is aborted even though C asked
        assert!(matches!(
            b_on_z.wait(),
            Err(TransactionError::Aborted { caller }) if caller == b.id()
        ));
        b.on(&m, |m| m.rollback_current_transaction()).wait();
        a_on_y.wait().unwrap();
        a.on(&m, |m| m.commit_current_transaction()).wait().unwrap();
        c_on_x.wait().unwrap();
        c.on(&m, |m| m.commit_current_transaction()).wait().unwrap();

        assert_eq!(m.with_resource(x, |l| l.tags.clone()).unwrap(), vec!["a", "c"]);
        assert_eq!(m.with_resource(y, |l| l.tags.clone()).unwrap(), vec!["a"]);
        assert_eq!(m.with_resource(z, |l| l.tags.clone()).unwrap(), vec!["c"]);
        assert_eq!(m.stats().deadlocks_resolved, 1);
    }

    #[test]
    fn test_chain_without_cycle_just_waits() {
        // GIVEN - A holds X, B holds Y and waits on X
        let m = Arc::new(bank(3, 0, LogicalClock::new()));
        let (x, y) = (rid(0), rid(1));
        let a = Caller::spawn("a");
        let b = Caller::spawn("b");
        let c = Caller::spawn("c");
        a.on(&m, move |m| -> TransactionResult<()> {
            m.start_transaction()?;
            m.operate_on_resource(x, Deposit(1))
        })
        .wait()
        .unwrap();
        b.on(&m, move |m| -> TransactionResult<()> {
            m.start_transaction()?;
            m.operate_on_resource(y, Deposit(1))
        })
        .wait()
        .unwrap();
        let b_on_x = b.on(&m, move |m| m.operate_on_resource(x, Deposit(1)));
        wait_until("b waits on x", || m.waiting_count(x) == 1);

        // WHEN - C queues behind B on Y
        let c_on_y = c.on(&m, move |m| -> TransactionResult<()> {
            m.start_transaction()?;
            m.operate_on_resource(y, Deposit(1))
        });
        wait_until("c waits on y", || m.waiting_count(y) == 1);

        // THEN - nobody is aborted and everything drains in order
        a.on(&m, |m| m.commit_current_transaction()).wait().unwrap();
        b_on_x.wait().unwrap();
        b.on(&m, |m| m.commit_current_transaction()).wait().unwrap();
        c_on_y.wait().unwrap();
        c.on(&m, |m| m.commit_current_transaction()).wait().unwrap();

        assert_eq!(m.stats().deadlocks_resolved, 0);
        assert_eq!(m.with_resource(x, |l| l.balance).unwrap(), 2);
        assert_eq!(m.with_resource(y, |l| l.balance).unwrap(), 2);
    }
}
