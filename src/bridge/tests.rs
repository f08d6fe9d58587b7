use super::*;
use crate::interop::RawOutcome;
use crate::objects::{dict, int, list, string, tuple, CompareOp, ObjRef, Slot};

unsafe fn read_usize(base: *const u8, offset: usize) -> usize {
    base.add(offset).cast::<usize>().read()
}

#[test]
fn test_build_has_every_required_entry() {
    let table = build().unwrap();
    for name in REQUIRED_OFFSETS {
        assert!(table.offset(name).is_some(), "missing offset {name}");
    }
    for name in REQUIRED_ADDRESSES {
        assert!(table.address(name).is_some(), "missing address {name}");
    }
    for (binary, inplace, _, _) in number_table() {
        assert!(table.address(binary).is_some());
        assert!(table.address(inplace).is_some());
    }
    assert_eq!(table.architecture, architecture());
    assert_eq!(table.constant("key_error"), Some(ErrorKind::Key as u32));
    assert_eq!(table.constant("stop_iteration"), Some(ErrorKind::StopIteration as u32));
}

#[test]
fn test_offsets_match_live_objects() {
    let table = build().unwrap();
    let items = tuple(vec![int(7), int(8), int(9)]);
    let base = items.as_obj().as_ptr() as *const u8;

    unsafe {
        assert_eq!(read_usize(base, table.offset("refcnt_offset").unwrap()), 1);
        assert_eq!(read_usize(base, table.offset("tuple_size_offset").unwrap()), 3);
        let first = read_usize(base, table.offset("tuple_item_offset").unwrap()) as *const ObjRef;
        assert_eq!((*first).as_int(), Some(7));

        let type_info = read_usize(base, table.offset("type_offset").unwrap());
        assert_eq!(type_info, items.as_obj().type_info() as *const TypeInfo as usize);
    }

    let values = list(vec![string("a"), string("b")]);
    let base = values.as_obj().as_ptr() as *const u8;
    unsafe {
        assert_eq!(read_usize(base, table.offset("list_size_offset").unwrap()), 2);
        let first = read_usize(base, table.offset("list_item_offset").unwrap()) as *const ObjRef;
        assert_eq!((*first).as_str(), Some("a"));
    }
}

#[test]
fn test_duplicate_names_are_refused() {
    let mut builder = BridgeTableBuilder::new();
    builder.offset("refcnt_offset", 0).unwrap();
    let err = builder.offset("refcnt_offset", 8).unwrap_err();
    assert!(matches!(err, RuntimeError::Bridge(_)));
    assert!(err.to_string().contains("refcnt_offset"));
}

#[test]
fn test_missing_entries_are_fatal() {
    let mut builder = BridgeTableBuilder::new();
    builder.offset("refcnt_offset", 0).unwrap();
    let err = builder.finish().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("type_offset"));
    assert!(message.contains("nb_call_function"));
    assert!(message.contains("nb_number_inplace_or"));
    assert!(message.contains("name_error_msg"));
}

#[test]
fn test_null_address_is_refused() {
    let mut builder = BridgeTableBuilder::new();
    assert!(builder.address("nb_incref", 0).is_err());
}

#[test]
fn test_message_addresses_point_at_templates() {
    let table = build().unwrap();
    let addr = table.message("global_name_error_msg").unwrap();
    let template = unsafe { CStr::from_ptr(addr as *const core::ffi::c_char) };
    assert_eq!(template, messages::GLOBAL_NAME_ERROR_MSG);
}

#[test]
fn test_publish_is_stable() {
    let first = publish();
    let second = publish();
    assert!(core::ptr::eq(first, second));
    assert!(global().is_some());
}

#[test]
fn test_json_lists_sections() {
    let table = build().unwrap();
    let json: serde_json::Value = serde_json::from_str(&table.to_json().unwrap()).unwrap();
    assert_eq!(json["architecture"], architecture());
    assert_eq!(
        json["addresses"]["nb_call_function"],
        table.address("nb_call_function").unwrap() as u64
    );
    assert_eq!(json["offsets"].as_object().unwrap().len(), table.offsets.len());
}

#[test]
fn test_dict_getitem_is_borrowed() {
    let namespace = dict();
    let value = int(41);
    namespace.set_str("answer", value.clone());
    let key = string("answer");
    let missing = string("question");

    unsafe {
        let found = nb_dict_getitem(namespace.as_obj().as_ptr(), key.as_ptr());
        assert_eq!(found, value.as_ptr());
        assert_eq!(value.refcount(), 2);
        assert!(nb_dict_getitem(namespace.as_obj().as_ptr(), missing.as_ptr()).is_null());
        // Not a dict
        assert!(nb_dict_getitem(key.as_ptr(), key.as_ptr()).is_null());
    }
}

#[test]
fn test_dict_setitem_reports_unhashable_key() {
    let namespace = dict();
    let key = list(vec![]);
    let value = int(1);
    unsafe {
        let err = nb_dict_setitem(namespace.as_obj().as_ptr(), key.as_obj().as_ptr(), value.as_ptr());
        assert!(!err.is_null());
        assert_eq!(crate::interop::nb_error_kind(err), ErrorKind::Type as u32);
        crate::interop::nb_error_free(err);
    }
    assert_eq!(value.refcount(), 1);
}

#[test]
fn test_number_symbols() {
    let a = int(6);
    let b = int(7);
    let product = unsafe { nb_number_multiply(a.as_ptr(), b.as_ptr()).into_result() }.unwrap();
    assert_eq!(product.as_int(), Some(42));

    let zero = int(0);
    let err = unsafe { nb_number_floor_divide(a.as_ptr(), zero.as_ptr()).into_result() }.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ZeroDivision);

    let null = unsafe { nb_number_add(a.as_ptr(), core::ptr::null_mut()).into_result() }.unwrap_err();
    assert_eq!(null.kind(), ErrorKind::System);
    assert_eq!(a.refcount(), 1);
}

#[test]
fn test_inplace_add_extends_list() {
    let target = list(vec![int(1)]);
    let extra = list(vec![int(2)]);
    let result = unsafe {
        nb_number_inplace_add(target.as_obj().as_ptr(), extra.as_obj().as_ptr()).into_result()
    }
    .unwrap();
    assert!(result.ptr_eq(target.as_obj()));
    assert_eq!(target.len(), 2);
}

#[test]
fn test_error_format_fills_template() {
    let name = string("spam");
    unsafe {
        let err = nb_error_format(
            ErrorKind::Name as u32,
            messages::NAME_ERROR_MSG.as_ptr(),
            name.as_ptr(),
        );
        assert_eq!(nb_error_matches(err, ErrorKind::Name as u32), 1);
        assert_eq!(nb_error_matches(err, ErrorKind::Key as u32), 0);
        assert_eq!((*err).to_string(), "name 'spam' is not defined");
        crate::interop::nb_error_free(err);
    }
}

#[test]
fn test_stack_builders_consume_slots() {
    // Stack order: last pushed first
    let mut stack: Vec<Slot> = vec![Some(int(3)), Some(int(2)), Some(int(1))];
    let built = unsafe { ObjRef::from_raw(nb_tuple_from_stack(stack.as_mut_ptr(), 3)) };
    assert!(stack.iter().all(Option::is_none));
    assert_eq!(crate::objects::protocol::repr(&built), "(1, 2, 3)");

    let mut stack: Vec<Slot> = vec![Some(string("b")), Some(string("a"))];
    let built = unsafe { ObjRef::from_raw(nb_list_from_stack(stack.as_mut_ptr(), 2)) };
    assert!(stack.iter().all(Option::is_none));
    assert_eq!(crate::objects::protocol::repr(&built), "['a', 'b']");
}

#[test]
fn test_truth_and_compare() {
    let one = int(1);
    let two = int(2);
    unsafe {
        assert_eq!(nb_object_is_true(one.as_ptr()), 1);
        assert_eq!(nb_object_is_true(int(0).as_ptr()), 0);
        assert_eq!(nb_object_is_true(core::ptr::null_mut()), -1);

        let less = nb_compare(one.as_ptr(), two.as_ptr(), CompareOp::Lt as u32);
        assert!(less.is_ok());
        let less = less.into_result().unwrap();
        assert_eq!(nb_object_is_true(less.as_ptr()), 1);

        let bad: RawOutcome = nb_compare(one.as_ptr(), two.as_ptr(), 99);
        assert!(bad.into_result().is_err());
    }
}

#[test]
fn test_incref_decref_pair() {
    let value = string("held");
    unsafe {
        nb_incref(value.as_ptr());
        assert_eq!(value.refcount(), 2);
        nb_decref(value.as_ptr());
        nb_incref(core::ptr::null_mut());
        nb_decref(core::ptr::null_mut());
    }
    assert_eq!(value.refcount(), 1);
}

#[test]
fn test_builtins_pointer_is_borrowed() {
    let builtins = nb_eval_get_builtins();
    assert!(!builtins.is_null());
    assert!(nb_eval_get_globals().is_null());
}
