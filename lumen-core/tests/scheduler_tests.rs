use std::cell::RefCell as StdRefCell;
use std::rc::Rc;

use lumen_core::Scheduler;

#[test]
fn callbacks_wait_for_the_next_flush() {
    let scheduler = Scheduler::new();
    let hits = Rc::new(StdRefCell::new(0));
    {
        let hits = hits.clone();
        scheduler.request_frame(move || *hits.borrow_mut() += 1);
    }
    assert_eq!(*hits.borrow(), 0);
    assert_eq!(scheduler.flush(), 1);
    assert_eq!(*hits.borrow(), 1);
    assert_eq!(scheduler.frame_count(), 1);
}

#[test]
fn cancelled_callbacks_never_run() {
    let scheduler = Scheduler::new();
    let hits = Rc::new(StdRefCell::new(0));
    let id = {
        let hits = hits.clone();
        scheduler.request_frame(move || *hits.borrow_mut() += 1)
    };
    assert!(scheduler.cancel(id));
    assert!(!scheduler.cancel(id));
    scheduler.flush();
    assert_eq!(*hits.borrow(), 0);
}

#[test]
fn requests_made_during_a_frame_run_next_frame() {
    let scheduler = Scheduler::new();
    let log = Rc::new(StdRefCell::new(Vec::new()));
    {
        let log = log.clone();
        let inner = scheduler.clone();
        scheduler.request_frame(move || {
            log.borrow_mut().push("outer");
            let log = log.clone();
            inner.request_frame(move || log.borrow_mut().push("inner"));
        });
    }
    scheduler.flush();
    assert_eq!(&*log.borrow(), &vec!["outer"]);
    scheduler.flush();
    assert_eq!(&*log.borrow(), &vec!["outer", "inner"]);
}

#[test]
fn spawned_tasks_run_when_driven() {
    let scheduler = Scheduler::new();
    let done = Rc::new(StdRefCell::new(false));
    {
        let done = done.clone();
        scheduler.spawn(async move {
            *done.borrow_mut() = true;
        });
    }
    assert!(!*done.borrow());
    assert!(scheduler.drive());
    assert!(*done.borrow());
}
