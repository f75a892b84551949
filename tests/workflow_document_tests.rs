//! Workflow documents as written by the editor, through snapshot capture

#[cfg(test)]
mod workflow_document_tests {
    use solana_sdk::pubkey::Pubkey;

    use solflow::services::StrategyType;
    use solflow::workflow::{
        LiquidityAddParams, NodeAction, NodeKind, SwapParams, TransferParams, ValidationError,
        Workflow, WorkflowSnapshot,
    };

    fn document(actions: serde_json::Value) -> Workflow {
        serde_json::from_value(serde_json::json!({
            "id": "wf-42",
            "name": "Morning routine",
            "creationDate": "2025-01-04T09:30:00Z",
            "actions": actions,
        }))
        .unwrap()
    }

    #[test]
    fn test_editor_document_captures_every_kind() {
        let dest = Pubkey::new_unique();
        let pool = Pubkey::new_unique();
        let workflow = document(serde_json::json!([
            {
                "id": "lp",
                "type": "meteoraNode",
                "position": { "x": 400, "y": 0 },
                "data": {
                    "label": "Provide",
                    "isActive": true,
                    "groupId": 0,
                    "orderId": "3",
                    "args": {
                        "serviceType": "addLiquidity",
                        "poolAddress": pool.to_string(),
                        "totalRangeInterval": "10",
                        "strategyType": "1",
                        "inputTokenAmount": 5000
                    }
                }
            },
            {
                "id": "swap",
                "type": "jupiterNode",
                "data": {
                    "label": "Buy USDC",
                    "orderId": 2,
                    "args": {
                        "sellingToken": "SOL",
                        "buyingToken": "USDC",
                        "swapAmount": "1000000",
                        "slippage": 30
                    }
                }
            },
            {
                "id": "pay",
                "type": "transferNode",
                "data": {
                    "label": "Pay",
                    "orderId": 1,
                    "args": { "address": dest.to_string(), "amount": 42 }
                }
            }
        ]));

        let snapshot = WorkflowSnapshot::capture(&workflow);
        assert!(snapshot.warnings().is_empty());
        assert_eq!(snapshot.workflow_id, "wf-42");

        let nodes = snapshot.nodes();
        let kinds: Vec<NodeKind> = nodes.iter().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Transfer, NodeKind::Swap, NodeKind::LiquidityAdd]
        );
        assert_eq!(
            nodes[0].action,
            NodeAction::Transfer(TransferParams {
                destination: dest,
                amount_lamports: 42,
            })
        );
        assert_eq!(
            nodes[1].action,
            NodeAction::Swap(SwapParams {
                sell_token: "SOL".to_string(),
                buy_token: "USDC".to_string(),
                amount: 1_000_000,
                slippage_bps: 30,
            })
        );
        assert_eq!(
            nodes[2].action,
            NodeAction::LiquidityAdd(LiquidityAddParams {
                pool,
                range_interval: 10,
                strategy: StrategyType::Curve,
                input_amount: 5_000,
            })
        );
    }

    #[test]
    fn test_invalid_records_become_warnings() {
        let workflow = document(serde_json::json!([
            {
                "id": "neg",
                "type": "transferNode",
                "data": {
                    "label": "Negative",
                    "orderId": -1,
                    "args": { "address": Pubkey::new_unique().to_string(), "amount": "1" }
                }
            },
            {
                "id": "zero",
                "type": "transferNode",
                "data": {
                    "label": "Zero",
                    "orderId": 1,
                    "args": { "address": Pubkey::new_unique().to_string(), "amount": "0" }
                }
            },
            {
                "id": "mystery",
                "type": "oracleNode",
                "data": { "label": "", "orderId": 2, "args": {} }
            },
            {
                "id": "off",
                "type": "oracleNode",
                "data": { "label": "Disabled", "isActive": false, "orderId": 3 }
            }
        ]));

        let snapshot = WorkflowSnapshot::capture(&workflow);
        assert!(snapshot.is_empty());

        let warnings = snapshot.warnings();
        assert_eq!(warnings.len(), 3);
        assert_eq!(
            warnings[0].error,
            ValidationError::InvalidOrdering {
                field: "orderId",
                value: "-1".to_string()
            }
        );
        assert!(matches!(
            warnings[1].error,
            ValidationError::InvalidAmount { param: "amountLamports", .. }
        ));
        assert_eq!(
            warnings[2].error,
            ValidationError::UnknownKind("oracleNode".to_string())
        );
        // empty label falls back to the id
        assert_eq!(warnings[2].label, "mystery");
    }

    #[test]
    fn test_malformed_order_id_skips_only_that_node() {
        let dest = Pubkey::new_unique();
        let workflow = document(serde_json::json!([
            {
                "id": "typo",
                "type": "transferNode",
                "data": {
                    "label": "Typo",
                    "orderId": "second",
                    "args": { "address": dest.to_string(), "amount": "1" }
                }
            },
            {
                "id": "ok",
                "type": "transferNode",
                "data": {
                    "label": "Fine",
                    "orderId": 2,
                    "args": { "address": dest.to_string(), "amount": "7" }
                }
            }
        ]));

        let snapshot = WorkflowSnapshot::capture(&workflow);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.nodes()[0].id, "ok");
        assert_eq!(snapshot.warnings().len(), 1);
        assert_eq!(snapshot.warnings()[0].node_id, "typo");
        assert!(matches!(
            snapshot.warnings()[0].error,
            ValidationError::InvalidOrdering { field: "orderId", .. }
        ));
    }

    #[test]
    fn test_bare_action_list_parses_without_workflow_envelope() {
        let actions: Vec<solflow::workflow::ActionRecord> =
            serde_json::from_value(serde_json::json!([
                {
                    "id": "rm",
                    "type": "meteoraNode",
                    "data": {
                        "orderId": 1,
                        "args": {
                            "serviceType": "removeLiquidity",
                            "poolAddress": Pubkey::new_unique().to_string()
                        }
                    }
                }
            ]))
            .unwrap();

        let mut workflow = Workflow::new("bare", "bare");
        workflow.actions = actions;
        let snapshot = WorkflowSnapshot::capture(&workflow);
        assert_eq!(snapshot.nodes()[0].kind(), NodeKind::LiquidityRemove);
        assert_eq!(snapshot.nodes()[0].label, "rm");
    }
}
