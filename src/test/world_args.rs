//! Scenario 6: a child retrieves its own constructor arguments.

use futures::executor::block_on;

use crate::handle::{ObjectId, WireRef};
use crate::transport::local_pair;
use crate::{Value, World};

#[test]
fn world_args_returns_the_values_passed_to_create_world() {
    let _ = env_logger::builder().is_test(true).try_init();

    let parent = World::new_root();
    let (ta, tb) = local_pair();
    let create = parent.create_world(ta, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    let world_args = std::rc::Rc::new(std::cell::RefCell::new(None));
    let capture = world_args.clone();
    let _child_world = World::init_world(tb, move |_parent_root, world| {
        let self_root = world.handle_from_wire(WireRef { world: world.id(), object: ObjectId(0) });
        let args = block_on(self_root.call("worldArgs", vec![])).expect("worldArgs resolves locally");
        *capture.borrow_mut() = Some(args);
    });
    let _child_root = block_on(create).expect("child ready");

    assert_eq!(
        world_args.borrow().clone().unwrap(),
        Value::list([Value::Int(1), Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn world_args_called_with_arguments_is_not_callable() {
    let _ = env_logger::builder().is_test(true).try_init();

    let parent = World::new_root();
    let (ta, tb) = local_pair();
    let create = parent.create_world(ta, vec![]);
    let err = std::rc::Rc::new(std::cell::RefCell::new(None));
    let capture = err.clone();
    let _child_world = World::init_world(tb, move |_parent_root, world| {
        let self_root = world.handle_from_wire(WireRef { world: world.id(), object: ObjectId(0) });
        let result = block_on(self_root.call("worldArgs", vec![Value::Int(0)]));
        *capture.borrow_mut() = Some(result);
    });
    let _child_root = block_on(create).expect("child ready");

    let result = err.borrow_mut().take().unwrap();
    assert!(result.is_err());
}
