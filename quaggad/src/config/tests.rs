use super::*;

#[test]
fn unknown_options_are_rejected_at_load() {
    quagga_test::init();

    let toml = r#"
        chain = "btc"
        network = "regtest"
        shardcount = 8
    "#;
    let parsed: Result<Config, _> = toml::from_str(toml);
    let error = parsed.unwrap_err().to_string();
    assert!(error.contains("shardcount"), "error was: {}", error);
}

#[test]
fn minimal_config_fills_defaults() {
    quagga_test::init();

    let config: Config = toml::from_str(
        r#"
        chain = "mvc"
        network = "testnet"
        data_dir = "/tmp/quagga-test"
        "#,
    )
    .unwrap();

    assert_eq!(config.chain, Chain::Mvc);
    assert_eq!(config.network, Network::Testnet);
    assert_eq!(config.families, vec![TokenFamily::Ft, TokenFamily::Nft]);
    assert_eq!(config.batch_size, 1000);
    assert_eq!(config.max_batch_size_mb, 4);
    assert_eq!(config.check_interval_secs, 10);
}

#[test]
fn chain_data_dir_separates_networks() {
    quagga_test::init();

    let mut config = Config::default();
    config.data_dir = PathBuf::from("/data");
    config.chain = Chain::Doge;
    config.network = Network::Regtest;
    assert_eq!(
        config.chain_data_dir(),
        PathBuf::from("/data/doge-regtest")
    );
}

#[test]
fn store_and_index_slices_carry_the_shared_knobs() {
    quagga_test::init();

    let mut config = Config::default();
    config.shard_count = 16;
    config.batch_size = 250;

    assert_eq!(config.store_config().shard_count, 16);
    assert_eq!(config.index_config().batch_size, 250);
}
