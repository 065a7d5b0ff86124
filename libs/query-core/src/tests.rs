#[cfg(test)]
#[allow(clippy::module_inception)]
mod tests {
    use crate::ast::{CompareOperator, Expr, Value};
    use crate::{PageMeta, PageRequest, PagedResult, PagingError, SortDir, UNBOUNDED_PAGE_SIZE};

    #[test]
    fn test_page_meta_middle_page() {
        let meta = PageMeta::compute(95, &PageRequest::new(3, 10)).unwrap();

        assert_eq!(meta.total_pages, 10);
        assert_eq!(meta.first_item_on_page, 21);
        assert_eq!(meta.last_item_on_page, 30);
        assert!(meta.has_previous_page);
        assert!(meta.has_next_page);
        assert!(!meta.is_first_page);
        assert!(!meta.is_last_page);
    }

    #[test]
    fn test_page_meta_single_partial_page() {
        let meta = PageMeta::compute(5, &PageRequest::new(1, 10)).unwrap();

        assert_eq!(meta.total_pages, 1);
        assert_eq!(meta.first_item_on_page, 1);
        assert_eq!(meta.last_item_on_page, 5);
        assert!(meta.is_first_page);
        assert!(meta.is_last_page);
        assert!(!meta.has_previous_page);
        assert!(!meta.has_next_page);
    }

    #[test]
    fn test_page_meta_last_partial_page() {
        let meta = PageMeta::compute(95, &PageRequest::new(10, 10)).unwrap();

        assert_eq!(meta.first_item_on_page, 91);
        assert_eq!(meta.last_item_on_page, 95);
        assert!(meta.is_last_page);
        assert!(!meta.has_next_page);
        assert!(!meta.is_past_end());
    }

    #[test]
    fn test_page_meta_zero_items() {
        let meta = PageMeta::compute(0, &PageRequest::new(1, 10)).unwrap();

        assert_eq!(meta.total_pages, 0);
        assert!(meta.is_first_page);
        assert!(meta.is_last_page);
        assert!(!meta.has_next_page);
        assert!(!meta.has_previous_page);
        assert!(meta.is_past_end());
    }

    #[test]
    fn test_page_meta_past_the_end() {
        let meta = PageMeta::compute(25, &PageRequest::new(7, 10)).unwrap();

        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.page_number, 7);
        assert!(!meta.has_next_page);
        assert!(meta.has_previous_page);
        assert!(meta.is_last_page);
        assert!(meta.is_past_end());
        assert_eq!(meta.first_item_on_page, 61);
        assert_eq!(meta.last_item_on_page, 25);
    }

    #[test]
    fn test_page_meta_unbounded_holds_everything() {
        let page = PageRequest::default();
        assert!(page.is_unbounded());
        assert_eq!(page.offset(), 0);
        assert_eq!(page.limit(), None);

        let meta = PageMeta::compute(1234, &page).unwrap();
        assert_eq!(meta.total_pages, 1);
        assert_eq!(meta.page_size, UNBOUNDED_PAGE_SIZE);
        assert_eq!(meta.first_item_on_page, 1);
        assert_eq!(meta.last_item_on_page, 1234);
        assert!(meta.is_first_page && meta.is_last_page);
    }

    #[test]
    fn test_page_meta_unbounded_second_page_does_not_overflow() {
        let meta = PageMeta::compute(10, &PageRequest::new(2, UNBOUNDED_PAGE_SIZE)).unwrap();
        assert!(meta.is_past_end());
        assert!(!meta.has_next_page);
    }

    #[test]
    fn test_page_request_rejects_zero_size_and_number() {
        assert_eq!(
            PageMeta::compute(10, &PageRequest::new(1, 0)),
            Err(PagingError::InvalidPageSize)
        );
        assert_eq!(
            PageMeta::compute(10, &PageRequest::new(0, 10)),
            Err(PagingError::InvalidPageNumber)
        );
    }

    #[test]
    fn test_page_request_offset_and_limit() {
        let page = PageRequest::new(4, 25);
        assert_eq!(page.offset(), 75);
        assert_eq!(page.limit(), Some(25));
        assert_eq!(PageRequest::first(25).offset(), 0);
    }

    #[test]
    fn test_page_meta_invariants_hold_over_grid() {
        for total in 0u64..=60 {
            for size in 1u64..=12 {
                for number in 1u64..=8 {
                    let meta = PageMeta::compute(total, &PageRequest::new(number, size)).unwrap();

                    assert_eq!(meta.total_pages, total.div_ceil(size));
                    assert_eq!(meta.has_previous_page, number > 1);
                    assert_eq!(meta.has_next_page, number < meta.total_pages);
                    assert_eq!(meta.is_first_page, number == 1);
                    assert_eq!(meta.is_last_page, number >= meta.total_pages);
                    assert_eq!(meta.first_item_on_page, (number - 1) * size + 1);
                    assert_eq!(meta.last_item_on_page, (number * size).min(total));
                }
            }
        }
    }

    #[test]
    fn test_page_request_deserialize_defaults() {
        let page: PageRequest = serde_json::from_str(r#"{"size": 20}"#).unwrap();
        assert_eq!(page, PageRequest::new(1, 20));

        let page: PageRequest = serde_json::from_str("{}").unwrap();
        assert!(page.is_unbounded());
    }

    #[test]
    fn test_paged_result_map_items_keeps_meta() {
        let meta = PageMeta::compute(3, &PageRequest::first(10)).unwrap();
        let page = PagedResult::new(vec![1, 2, 3], meta).map_items(|n| n * 10);

        assert_eq!(page.items, vec![10, 20, 30]);
        assert_eq!(page.meta, meta);
    }

    #[test]
    fn test_sort_dir_serde() {
        assert_eq!(serde_json::to_string(&SortDir::Desc).unwrap(), "\"desc\"");
        assert_eq!(SortDir::default(), SortDir::Asc);
    }

    #[test]
    fn test_expr_builders() {
        let expr = Expr::compare("priority", CompareOperator::Ge, 3)
            .and(Expr::call("contains", "title", "rust").not());

        match expr {
            Expr::And(l, r) => {
                assert!(matches!(
                    *l,
                    Expr::Compare(_, CompareOperator::Ge, ref v) if **v == Expr::Value(Value::Int(3))
                ));
                assert!(matches!(*r, Expr::Not(_)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }
}
