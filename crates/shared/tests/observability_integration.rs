//! 可观测性模块集成测试
//!
//! 测试指标记录函数、配置反序列化与资源守卫。

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use loyalty_shared::observability::metrics::{
        get_handle, record_accrual_request, record_dispatch_batch, record_order_finalized,
        record_order_registered, record_rate_limited, set_worker_last_run,
    };

    #[test]
    fn test_record_accrual_request() {
        // 覆盖全部查询结果分类
        record_accrual_request("verdict", 0.05);
        record_accrual_request("rate_limited", 0.01);
        record_accrual_request("transport_error", 0.25);
        record_accrual_request("timeout", 5.0);
    }

    #[test]
    fn test_record_order_lifecycle() {
        record_order_registered("accepted");
        record_order_registered("already_uploaded");
        record_order_finalized("PROCESSED");
        record_order_finalized("INVALID");
    }

    #[test]
    fn test_record_pool_metrics() {
        record_dispatch_batch(0);
        record_dispatch_batch(50);
        record_rate_limited(60.0);
        set_worker_last_run("accrual_pool");
    }

    #[test]
    fn test_handle_absent_without_init() {
        assert!(get_handle().is_none());
    }
}

// ============================================================================
// 配置测试
// ============================================================================

mod config_tests {
    use loyalty_shared::observability::ObservabilityConfig;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "unknown-service");
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.log_level, "info");
        assert!(config.metrics_enabled);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ObservabilityConfig =
            serde_json::from_str(r#"{"log_level": "debug", "json_logs": true}"#).unwrap();

        assert_eq!(config.log_level, "debug");
        assert!(config.json_logs);
        assert_eq!(config.metrics_port, 9090);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_custom_config() {
        let config = ObservabilityConfig {
            service_name: "accrual-worker".to_string(),
            metrics_enabled: false,
            metrics_port: 9091,
            log_level: "debug".to_string(),
            json_logs: true,
        };

        assert_eq!(config.service_name, "accrual-worker");
        assert!(!config.metrics_enabled);
        assert_eq!(config.metrics_port, 9091);
    }
}

// ============================================================================
// Guard 测试
// ============================================================================

mod guard_tests {
    use loyalty_shared::observability::ObservabilityGuard;

    #[test]
    fn test_empty_guard() {
        let guard = ObservabilityGuard::empty();
        drop(guard);
    }

    #[test]
    fn test_guard_drop() {
        for _ in 0..10 {
            let guard = ObservabilityGuard::empty();
            drop(guard);
        }
    }
}
