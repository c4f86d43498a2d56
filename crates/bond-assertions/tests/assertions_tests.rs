use bond_assertions::{
    called_exactly_once_with_args, called_with_args, called_with_exact_args_list, times_called,
    was_called,
};
use bond_core::{spy, stub, BondError, StubTarget, Target};
use bond_runtime::{kwargs, CallArgs, Kwargs, Value};
use bond_test_utils::{invoke, sample_runtime, SampleRuntime};
use pretty_assertions::assert_eq;

fn bar(samples: &SampleRuntime) {
    invoke(&samples.my_module, "bar", CallArgs::positional([Value::from(42)])).unwrap();
}

fn foo(samples: &SampleRuntime) -> Value {
    samples.get("my_module", "foo")
}

fn check_was_called(samples: &SampleRuntime) {
    assert!(!was_called(&foo(samples)).unwrap());
    bar(samples);
    assert!(was_called(&foo(samples)).unwrap());
}

fn check_times_called(samples: &SampleRuntime) {
    assert!(times_called(&foo(samples), 0).unwrap());
    bar(samples);
    assert!(times_called(&foo(samples), 1).unwrap());
    bar(samples);
    bar(samples);
    bar(samples);
    assert!(times_called(&foo(samples), 4).unwrap());
}

fn self_stub(samples: &SampleRuntime) -> StubTarget {
    StubTarget::new((&samples.my_module, "foo"), foo(samples))
}

#[test]
fn test_was_called() {
    let samples = sample_runtime();

    let session = spy(&samples.runtime, [Target::attribute(&samples.my_module, "foo")]).unwrap();
    check_was_called(&samples);
    drop(session);

    let session = stub(&samples.runtime, [self_stub(&samples)]).unwrap();
    check_was_called(&samples);
    drop(session);
}

#[test]
fn test_was_called_throws_on_unspied_functions() {
    let samples = sample_runtime();
    bar(&samples);
    let err = was_called(&foo(&samples)).unwrap_err();
    assert_eq!(err, BondError::NotInstrumented);
    assert!(err.to_string().starts_with("The argument is not a spied function."));
}

#[test]
fn test_times_called() {
    let samples = sample_runtime();

    let session = spy(&samples.runtime, [Target::attribute(&samples.my_module, "foo")]).unwrap();
    check_times_called(&samples);
    drop(session);

    let session = stub(&samples.runtime, [self_stub(&samples)]).unwrap();
    check_times_called(&samples);
    drop(session);
}

#[test]
fn test_times_called_throws_on_unspied_functions() {
    let samples = sample_runtime();
    bar(&samples);
    let err = times_called(&foo(&samples), 1).unwrap_err();
    assert!(err.to_string().starts_with("The argument is not a spied function."));
}

#[test]
fn test_argument_predicates_throw_on_unspied_functions() {
    let samples = sample_runtime();
    let f = foo(&samples);
    assert_eq!(called_with_args(&f, None, None), Err(BondError::NotInstrumented));
    assert_eq!(
        called_exactly_once_with_args(&f, None, None),
        Err(BondError::NotInstrumented)
    );
    assert_eq!(
        called_with_exact_args_list(&f, None, None),
        Err(BondError::NotInstrumented)
    );
}

#[test]
fn test_keyword_arguments_are_matched_exactly() {
    let samples = sample_runtime();
    let _spy = spy(
        &samples.runtime,
        [Target::attribute(&samples.other_package, "make_a_network_request")],
    )
    .unwrap();
    let network = samples.get("other_package", "make_a_network_request");

    network
        .call(&CallArgs::positional([Value::from(1)]).with_kwarg("method", "GET"))
        .unwrap();

    let get = kwargs([("method", "GET")]);
    let post = kwargs([("method", "POST")]);
    assert!(called_with_args(&network, None, Some(&get)).unwrap());
    assert!(!called_with_args(&network, None, Some(&post)).unwrap());
    assert!(!called_with_args(&network, None, Some(&Kwargs::new())).unwrap());
    assert!(called_exactly_once_with_args(&network, Some(&[Value::from(1)][..]), Some(&get)).unwrap());
}

#[test]
fn test_self_referencing_arguments_are_matched() {
    let samples = sample_runtime();
    let _spy = spy(
        &samples.runtime,
        [Target::attribute(&samples.other_package, "write_to_disk")],
    )
    .unwrap();
    let write = samples.get("other_package", "write_to_disk");

    let cyclic = Value::list([Value::from(1)]);
    cyclic.as_list().unwrap().push(cyclic.clone());
    write.call(&CallArgs::positional([cyclic.clone()])).unwrap();

    assert!(called_with_args(&write, Some(&[cyclic.clone()][..]), None).unwrap());
    assert!(!called_with_args(&write, Some(&[Value::list([Value::from(1)])][..]), None).unwrap());
    cyclic.as_list().unwrap().clear();
}
