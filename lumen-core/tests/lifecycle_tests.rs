use std::cell::RefCell as StdRefCell;
use std::rc::Rc;

use lumen_core::Lifecycle;

#[test]
fn hooks_run_in_registration_order() {
    let log = Rc::new(StdRefCell::new(Vec::<String>::new()));
    let mut hooks: Lifecycle<str> = Lifecycle::new();

    for tag in ["a", "b"] {
        let log = log.clone();
        hooks.on_init(move |name: &str| log.borrow_mut().push(format!("init:{tag}:{name}")));
    }
    {
        let log = log.clone();
        hooks.on_destroy(move |name: &str| log.borrow_mut().push(format!("destroy:{name}")));
    }

    hooks.run_init("host");
    hooks.run_update("host");
    hooks.run_destroy("host");

    assert_eq!(
        &*log.borrow(),
        &vec!["init:a:host".to_string(), "init:b:host".into(), "destroy:host".into()]
    );
    assert!(!hooks.has_update_hooks());
}
